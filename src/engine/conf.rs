//! Resolver configuration.
//!
//! The stub engine reads its name servers and a few options from the
//! system’s `/etc/resolv.conf`. The format is that of glibc’s resolver.
//! Keywords and options the engine has no use for are accepted and
//! ignored. So are malformed lines: a typo in one line shouldn’t cost the
//! servers given in all the others.

use super::ServerAddr;
use std::io::{self, BufRead, Read};
use std::net::IpAddr;
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};
use std::time::Duration;
use std::{error, fmt, fs};
use tracing::debug;

/// The location of the system configuration.
pub const SYSTEM_RESOLV_CONF: &str = "/etc/resolv.conf";

//------------ ResolvConf ----------------------------------------------------

/// Resolver configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvConf {
    /// Name servers in order of preference.
    pub servers: Vec<ServerAddr>,

    /// Timeout for a single attempt.
    pub timeout: Duration,

    /// Number of attempts per server before giving up.
    pub attempts: usize,

    /// Spread queries over all servers instead of trying them in order.
    pub rotate: bool,
}

impl ResolvConf {
    /// Creates a new, empty configuration.
    ///
    /// Using an empty configuration will fail since it does not contain
    /// any name servers. Call [`finalize`][Self::finalize] to make it
    /// usable.
    pub fn new() -> Self {
        ResolvConf {
            servers: Vec::new(),
            timeout: Duration::from_secs(5),
            attempts: 2,
            rotate: false,
        }
    }

    /// Finalizes the configuration for actual use.
    ///
    /// Without any name servers, the fallback server on localhost is used.
    pub fn finalize(&mut self) {
        if self.servers.is_empty() {
            self.servers.push(ServerAddr::fallback());
        }
    }

    /// Reads the system configuration.
    ///
    /// A missing or unreadable file results in the finalized empty
    /// configuration.
    pub fn system() -> Self {
        let mut res = ResolvConf::new();
        if let Err(err) = res.parse_file(SYSTEM_RESOLV_CONF) {
            debug!("cannot read {}: {}", SYSTEM_RESOLV_CONF, err);
            res = ResolvConf::new();
        }
        res.finalize();
        res
    }
}

impl Default for ResolvConf {
    fn default() -> Self {
        let mut res = Self::new();
        res.finalize();
        res
    }
}

/// # Parsing Configuration File
///
impl ResolvConf {
    /// Parses the configuration from a file.
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let mut file = fs::File::open(path)?;
        self.parse(&mut file)
    }

    /// Parses the configuration from a reader.
    ///
    /// Only fails if reading fails. Lines that can’t be parsed are skipped.
    pub fn parse<R: Read>(&mut self, reader: &mut R) -> Result<(), Error> {
        for line in io::BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim_end();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#')
            {
                continue;
            }

            let mut words = line.split_whitespace();
            let res = match words.next() {
                Some("nameserver") => self.parse_nameserver(words),
                Some("options") => {
                    self.parse_options(words);
                    Ok(())
                }
                Some(keyword) => {
                    debug!("ignoring resolv.conf keyword {}", keyword);
                    Ok(())
                }
                None => Ok(()),
            };
            if let Err(err) = res {
                debug!("skipping resolv.conf line {:?}: {}", line, err);
            }
        }
        Ok(())
    }

    fn parse_nameserver(&mut self, mut words: SplitWhitespace) -> Result<(), Error> {
        let word = next_word(&mut words)?;
        // Drop an IPv6 zone index.
        let word = word.split('%').next().unwrap_or(word);
        let addr = IpAddr::from_str(word).map_err(|_| Error::Parse)?;
        no_more_words(words)?;
        self.servers.push(ServerAddr::new(addr, 0));
        Ok(())
    }

    fn parse_options(&mut self, words: SplitWhitespace) {
        for word in words {
            match split_arg(word) {
                Ok(("timeout", Some(n))) => {
                    self.timeout = Duration::from_secs(n.min(30) as u64)
                }
                Ok(("attempts", Some(n))) => self.attempts = n.clamp(1, 5),
                Ok(("rotate", None)) => self.rotate = true,
                // Ignore unknown or misformated options.
                _ => {}
            }
        }
    }
}

//------------ Private Helpers -----------------------------------------------

fn next_word<'a>(words: &'a mut SplitWhitespace) -> Result<&'a str, Error> {
    words.next().ok_or(Error::Parse)
}

fn no_more_words(mut words: SplitWhitespace) -> Result<(), Error> {
    match words.next() {
        Some(..) => Err(Error::Parse),
        None => Ok(()),
    }
}

fn split_arg(s: &str) -> Result<(&str, Option<usize>), Error> {
    match s.find(':') {
        Some(idx) => {
            let (left, right) = s.split_at(idx);
            let value = right[1..].parse().map_err(|_| Error::Parse)?;
            Ok((left, Some(value)))
        }
        None => Ok((s, None)),
    }
}

//------------ Error ---------------------------------------------------------

/// The configuration could not be read.
#[derive(Debug)]
pub enum Error {
    Parse,
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Parse => f.write_str("error parsing configuration"),
            Error::Io(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Parse => None,
            Error::Io(ref err) => Some(err),
        }
    }
}

//============ Testing =======================================================
