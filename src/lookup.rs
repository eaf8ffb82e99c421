//! Looking up hosts through the operating system.
//!
//! These functions don’t use a channel but the system’s own resolver via
//! `getaddrinfo(3)` and `getnameinfo(3)`. The calls block, so they are run
//! on Tokio’s blocking thread pool.

use std::ffi::{CStr, CString};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::raw::{c_char, c_int};
use std::{error, fmt, io, mem, ops, ptr};
use tokio::task::spawn_blocking;
use tracing::trace;

/// The size of the host name buffer for `getnameinfo`.
const HOST_LEN: usize = 1025;

/// The size of the service name buffer for `getnameinfo`.
const SERV_LEN: usize = 32;

//------------ Family --------------------------------------------------------

/// The address family to look up.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Family {
    /// Any family.
    #[default]
    Unspec,
    V4,
    V6,
}

impl Family {
    /// Returns the family for its number: 0, 4, or 6.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Family::Unspec),
            4 => Some(Family::V4),
            6 => Some(Family::V6),
            _ => None,
        }
    }

    fn to_af(self) -> c_int {
        match self {
            Family::Unspec => libc::AF_UNSPEC,
            Family::V4 => libc::AF_INET,
            Family::V6 => libc::AF_INET6,
        }
    }
}

//------------ AddrInfoFlags -------------------------------------------------

/// Flags for [`get_addr_info`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct AddrInfoFlags(c_int);

impl AddrInfoFlags {
    /// Only return addresses of families configured on the system.
    pub const ADDRCONFIG: Self = AddrInfoFlags(libc::AI_ADDRCONFIG);

    /// Return IPv4-mapped IPv6 addresses if there are no IPv6 addresses.
    pub const V4MAPPED: Self = AddrInfoFlags(libc::AI_V4MAPPED);

    /// Together with `V4MAPPED`, return both IPv6 and mapped IPv4
    /// addresses.
    pub const ALL: Self = AddrInfoFlags(libc::AI_ALL);

    pub const fn empty() -> Self {
        AddrInfoFlags(0)
    }

    pub const fn bits(self) -> c_int {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for AddrInfoFlags {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        AddrInfoFlags(self.0 | other.0)
    }
}

//------------ NameInfo ------------------------------------------------------

/// The result of [`get_name_info`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NameInfo {
    pub hostname: String,
    pub service: String,
}

//------------ get_addr_info -------------------------------------------------

/// Looks up the addresses of a host.
///
/// Unless `verbatim` is set, IPv4 addresses are returned before IPv6
/// addresses. Otherwise the order is that of the system resolver. If
/// there are no addresses, [`LookupError::NoData`] is returned.
pub async fn get_addr_info(
    host: &str,
    family: Family,
    flags: AddrInfoFlags,
    verbatim: bool,
) -> Result<Vec<IpAddr>, LookupError> {
    let host = CString::new(host).map_err(|_| {
        LookupError::InvalidArgument("host name contains a NUL byte")
    })?;
    trace!("getaddrinfo {:?} ({:?})", host, family);
    let addrs = spawn_blocking(move || sys_getaddrinfo(&host, family, flags))
        .await
        .map_err(|_| LookupError::Aborted)??;
    order_addrs(addrs, verbatim)
}

/// Orders looked up addresses.
fn order_addrs(
    addrs: Vec<IpAddr>,
    verbatim: bool,
) -> Result<Vec<IpAddr>, LookupError> {
    if addrs.is_empty() {
        return Err(LookupError::NoData);
    }
    if verbatim {
        return Ok(addrs);
    }
    let (mut res, v6): (Vec<_>, Vec<_>) =
        addrs.into_iter().partition(IpAddr::is_ipv4);
    res.extend(v6);
    Ok(res)
}

/// A list returned by `getaddrinfo`.
struct AddrInfoList(*mut libc::addrinfo);

impl AddrInfoList {
    fn addrs(&self) -> Vec<IpAddr> {
        let mut res = Vec::new();
        let mut cur = self.0;
        // Safety: the list stays valid until dropped and every entry's
        // address has the size its family requires.
        unsafe {
            while let Some(info) = cur.as_ref() {
                if !info.ai_addr.is_null() {
                    match info.ai_family {
                        libc::AF_INET => {
                            let sin = &*(info.ai_addr as *const libc::sockaddr_in);
                            res.push(IpAddr::V4(Ipv4Addr::from(u32::from_be(
                                sin.sin_addr.s_addr,
                            ))));
                        }
                        libc::AF_INET6 => {
                            let sin6 =
                                &*(info.ai_addr as *const libc::sockaddr_in6);
                            res.push(IpAddr::V6(Ipv6Addr::from(
                                sin6.sin6_addr.s6_addr,
                            )));
                        }
                        _ => {}
                    }
                }
                cur = info.ai_next;
            }
        }
        res
    }
}

impl Drop for AddrInfoList {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // Safety: the pointer came from a successful getaddrinfo.
            unsafe { libc::freeaddrinfo(self.0) }
        }
    }
}

fn sys_getaddrinfo(
    host: &CStr,
    family: Family,
    flags: AddrInfoFlags,
) -> Result<Vec<IpAddr>, LookupError> {
    // Safety: an all-zero addrinfo is a valid hints value.
    let mut hints: libc::addrinfo = unsafe { mem::zeroed() };
    hints.ai_family = family.to_af();
    hints.ai_socktype = libc::SOCK_STREAM;
    hints.ai_flags = flags.bits();

    let mut list = AddrInfoList(ptr::null_mut());
    // Safety: all pointers are valid for the duration of the call.
    let rc = unsafe {
        libc::getaddrinfo(host.as_ptr(), ptr::null(), &hints, &mut list.0)
    };
    if rc != 0 {
        return Err(LookupError::from_gai(rc));
    }
    Ok(list.addrs())
}

//------------ get_name_info -------------------------------------------------

/// Looks up the host name and service for an address and port.
///
/// The address must be an IPv4 or IPv6 address in textual form. A host
/// name is required, so an address without one is an error.
pub async fn get_name_info(
    ip: &str,
    port: u16,
) -> Result<NameInfo, LookupError> {
    let addr = ip
        .parse::<IpAddr>()
        .map_err(|_| LookupError::InvalidArgument("invalid IP address"))?;
    let addr = SocketAddr::new(addr, port);
    trace!("getnameinfo {}", addr);
    spawn_blocking(move || sys_getnameinfo(addr))
        .await
        .map_err(|_| LookupError::Aborted)?
}

fn sys_getnameinfo(addr: SocketAddr) -> Result<NameInfo, LookupError> {
    // Safety: an all-zero sockaddr_storage is valid and large enough for
    // both address families.
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(addr) => {
            let sin = unsafe {
                &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in)
            };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = addr.port().to_be();
            sin.sin_addr.s_addr = u32::from(*addr.ip()).to_be();
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(addr) => {
            let sin6 = unsafe {
                &mut *(&mut storage as *mut _ as *mut libc::sockaddr_in6)
            };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = addr.port().to_be();
            sin6.sin6_addr.s6_addr = addr.ip().octets();
            sin6.sin6_flowinfo = addr.flowinfo();
            sin6.sin6_scope_id = addr.scope_id();
            mem::size_of::<libc::sockaddr_in6>()
        }
    };

    let mut host = [0 as c_char; HOST_LEN];
    let mut serv = [0 as c_char; SERV_LEN];
    // Safety: the buffers are valid for their given lengths.
    let rc = unsafe {
        libc::getnameinfo(
            &storage as *const _ as *const libc::sockaddr,
            len as libc::socklen_t,
            host.as_mut_ptr(),
            HOST_LEN as libc::socklen_t,
            serv.as_mut_ptr(),
            SERV_LEN as libc::socklen_t,
            libc::NI_NAMEREQD,
        )
    };
    if rc != 0 {
        return Err(LookupError::from_gai(rc));
    }
    // Safety: on success both buffers hold NUL-terminated strings.
    let (hostname, service) = unsafe {
        (
            CStr::from_ptr(host.as_ptr()).to_string_lossy().into_owned(),
            CStr::from_ptr(serv.as_ptr()).to_string_lossy().into_owned(),
        )
    };
    Ok(NameInfo { hostname, service })
}

//------------ canonicalize_ip -----------------------------------------------

/// Returns the canonical textual form of an IP address.
///
/// Returns `None` if `ip` isn’t an IPv4 or IPv6 address.
pub fn canonicalize_ip(ip: &str) -> Option<String> {
    ip.parse::<IpAddr>().ok().map(|addr| addr.to_string())
}

//------------ LookupError ---------------------------------------------------

/// An error happened during a system lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LookupError {
    /// The lookup succeeded but returned no addresses.
    NoData,

    /// An argument was rejected before the lookup started.
    InvalidArgument(&'static str),

    /// The system resolver failed.
    Os { code: i32, message: String },

    /// The lookup task was aborted.
    Aborted,
}

impl LookupError {
    fn from_gai(code: c_int) -> Self {
        let message = if code == libc::EAI_SYSTEM {
            io::Error::last_os_error().to_string()
        }
        else {
            // Safety: gai_strerror returns a static string.
            unsafe { CStr::from_ptr(libc::gai_strerror(code)) }
                .to_string_lossy()
                .into_owned()
        };
        LookupError::Os { code, message }
    }

    /// Returns a short code for the error.
    pub fn code(&self) -> &'static str {
        match *self {
            LookupError::NoData => "EAI_NODATA",
            LookupError::InvalidArgument(_) => "EINVAL",
            LookupError::Os { code, .. } => match code {
                libc::EAI_AGAIN => "EAI_AGAIN",
                libc::EAI_BADFLAGS => "EAI_BADFLAGS",
                libc::EAI_FAIL => "EAI_FAIL",
                libc::EAI_FAMILY => "EAI_FAMILY",
                libc::EAI_MEMORY => "EAI_MEMORY",
                libc::EAI_NONAME => "EAI_NONAME",
                libc::EAI_SERVICE => "EAI_SERVICE",
                libc::EAI_SOCKTYPE => "EAI_SOCKTYPE",
                libc::EAI_SYSTEM => "EAI_SYSTEM",
                _ => "EAI_UNKNOWN",
            },
            LookupError::Aborted => "ECANCELED",
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LookupError::NoData => f.write_str("no addresses found"),
            LookupError::InvalidArgument(msg) => {
                write!(f, "invalid argument: {}", msg)
            }
            LookupError::Os { ref message, .. } => {
                write!(f, "{}: {}", self.code(), message)
            }
            LookupError::Aborted => f.write_str("lookup aborted"),
        }
    }
}

impl error::Error for LookupError {}

//============ Testing =======================================================
