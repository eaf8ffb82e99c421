//! Errors while reading wire format data.
//!
//! Parsing goes through [`octseq::parse::Parser`] which only knows about
//! running out of data. Everything else a response can get wrong is a
//! [`FormError`]. Callers of the crate never see either: once a response
//! fails to parse, it is simply a [`Status::BadResp`].

use crate::status::Status;
use core::fmt;
use octseq::parse::ShortInput;

//------------ ParseError ----------------------------------------------------

/// A response could not be parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// The data ended before the item being parsed.
    ShortInput,

    /// The data is there but malformed.
    Form(FormError),
}

impl ParseError {
    /// Creates a form error with the given message.
    pub fn form_error(msg: &'static str) -> Self {
        ParseError::Form(FormError(msg))
    }
}

//--- From

impl From<ShortInput> for ParseError {
    fn from(_: ShortInput) -> Self {
        ParseError::ShortInput
    }
}

impl From<FormError> for ParseError {
    fn from(err: FormError) -> Self {
        ParseError::Form(err)
    }
}

impl From<ParseError> for Status {
    fn from(_: ParseError) -> Self {
        Status::BadResp
    }
}

//--- Display and Error

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParseError::ShortInput => f.write_str("short input"),
            ParseError::Form(err) => write!(f, "malformed data: {}", err),
        }
    }
}

impl std::error::Error for ParseError {}

//------------ FormError -----------------------------------------------------

/// Malformed data with a short description of what is wrong.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormError(&'static str);

impl FormError {
    pub fn new(msg: &'static str) -> Self {
        FormError(msg)
    }

    pub fn message(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for FormError {}

//============ Testing =======================================================
