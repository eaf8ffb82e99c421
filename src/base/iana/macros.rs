//! The macro behind the IANA types.

/// Defines a newtype around an integer with a set of well-known values.
///
/// Each value is given as `(CONST => value, "MNEMONIC")`. The type is
/// printed as its mnemonic if it has one and as the prefix followed by the
/// number otherwise, e.g., `TYPE65280`.
macro_rules! int_enum {
    ( $(#[$attr:meta])* =>
      $ianatype:ident, $inttype:path, $prefix:expr;
      $( $(#[$variant_attr:meta])* ( $variant:ident =>
                                        $value:expr, $mnemonic:expr) )* ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $ianatype($inttype);

        impl $ianatype {
            $(
                $(#[$variant_attr])*
                pub const $variant: $ianatype = $ianatype($value);
            )*

            #[must_use]
            pub const fn from_int(value: $inttype) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn to_int(self) -> $inttype {
                self.0
            }

            /// Returns the mnemonic of a well-known value.
            pub fn mnemonic(self) -> Option<&'static str> {
                $(
                    if self == $ianatype::$variant {
                        return Some($mnemonic)
                    }
                )*
                None
            }
        }

        impl From<$inttype> for $ianatype {
            fn from(value: $inttype) -> Self {
                $ianatype(value)
            }
        }

        impl From<$ianatype> for $inttype {
            fn from(value: $ianatype) -> Self {
                value.0
            }
        }

        impl core::fmt::Debug for $ianatype {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                match self.mnemonic() {
                    Some(name) => {
                        write!(f, concat!(stringify!($ianatype), "::{}"), name)
                    }
                    None => write!(
                        f, concat!(stringify!($ianatype), "({})"), self.0
                    ),
                }
            }
        }

        impl core::fmt::Display for $ianatype {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                match self.mnemonic() {
                    Some(name) => f.write_str(name),
                    None => write!(f, concat!($prefix, "{}"), self.0),
                }
            }
        }
    }
}
