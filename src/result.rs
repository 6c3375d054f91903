//! Utilities for error handling

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    fmt::Display,
};

use downcast_rs::{impl_downcast, DowncastSync};
use thiserror::Error;

use crate::location::{Located, Location};

/// The kinds of errors we have while compiling and running a top-level item.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source text could not be read or tokenized.
    #[error("lexical error")]
    Lex,
    /// The token stream does not form a valid top-level item.
    #[error("parse error")]
    Parse,
    /// The AST could not be translated to IR.
    #[error("code generation failed")]
    Codegen,
    /// Generated IR is ill-formed. This is a defect in code generation.
    #[error("verification failed")]
    VerificationFailed,
    /// A symbol could not be resolved by the execution backend.
    #[error("link error")]
    Link,
    /// The execution backend failed to initialize, compile or run code.
    #[error("execution backend error")]
    Backend,
}

/// An error object that can hold any [std::error::Error].
#[derive(Debug)]
pub struct Error {
    /// The kind of error this is
    pub kind: ErrorKind,
    /// The actual error object describing the error
    pub err: Box<dyn KalError>,
    /// Location of this error in the program being compiled
    pub loc: Location,
    /// Details of how this error occurred
    pub backtrace: Backtrace,
}

impl Error {
    /// Render the error along with its backtrace, if one was captured.
    pub fn report(&self) -> String {
        if self.backtrace.status() == BacktraceStatus::Captured {
            format!("{}\nError backtrace:\n{}", self, self.backtrace)
        } else {
            self.to_string()
        }
    }
}

/// This does not print the [Backtrace]. Use [Error::report] for that.
impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.loc.is_known() {
            write!(f, "[{}] {}: {}", self.loc, self.kind, self.err)
        } else {
            write!(f, "{}: {}", self.kind, self.err)
        }
    }
}

pub trait KalError: std::error::Error + DowncastSync {}

impl<T: std::error::Error + Send + Sync + 'static> KalError for T {}

impl_downcast!(KalError);

impl std::error::Error for Error {}

impl Located for Error {
    fn loc(&self) -> Location {
        self.loc
    }

    fn set_loc(&mut self, loc: Location) {
        self.loc = loc;
    }
}

/// Type alias for [std::result::Result] with the error type set to [struct@Error]
pub type Result<T> = std::result::Result<T, Error>;

#[doc(hidden)]
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StringError(pub String);

/// Specify [ErrorKind] and create [struct@Error] from any [std::error::Error] object.
/// To create [Result], use [create_err!](crate::create_err) instead.
/// The macro also accepts [format!] like arguments to create one-off errors.
#[macro_export]
macro_rules! create_error {
    ($loc: expr, $kind: expr, $str: literal $($t:tt)*) => {
        $crate::create_error!($loc, $kind, $crate::result::StringError(format!($str $($t)*)))
    };
    ($loc: expr, $kind: expr, $err: expr) => {
        $crate::result::Error {
            kind: $kind,
            err: Box::new($err),
            loc: $loc,
            backtrace: std::backtrace::Backtrace::capture(),
        }
    };
}

/// Specify [ErrorKind] and create [Result] from any [std::error::Error] object.
/// To create [struct@Error], use [create_error!](crate::create_error) instead.
#[macro_export]
macro_rules! create_err {
    ($loc: expr, $kind: expr, $str: literal $($t:tt)*) => {
        $crate::create_err!($loc, $kind, $crate::result::StringError(format!($str $($t)*)))
    };
    ($loc: expr, $kind: expr, $err: expr) => {
        Err($crate::create_error!($loc, $kind, $err))
    };
}

/// Create [ErrorKind::Lex] [struct@Error] from any [std::error::Error] object.
#[macro_export]
macro_rules! lex_error {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_error!($loc, $crate::result::ErrorKind::Lex, $($t)*)
    }
}

/// Create [ErrorKind::Lex] [Result] from any [std::error::Error] object.
#[macro_export]
macro_rules! lex_err {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_err!($loc, $crate::result::ErrorKind::Lex, $($t)*)
    }
}

/// Create [ErrorKind::Parse] [struct@Error] from any [std::error::Error] object.
#[macro_export]
macro_rules! parse_error {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_error!($loc, $crate::result::ErrorKind::Parse, $($t)*)
    }
}

/// Create [ErrorKind::Parse] [Result] from any [std::error::Error] object.
/// ```rust
/// use thiserror::Error;
/// use kaleidoscope::{parse_err, result::{Result, ErrorKind, Error}, location::Location};
///
/// #[derive(Error, Debug)]
/// #[error("sample error")]
/// pub struct SampleErr;
///
/// assert!(
///     matches!(
///         parse_err!(Location::Unknown, SampleErr),
///         Result::<()>::Err(Error {
///            kind: ErrorKind::Parse,
///            err,
///            ..
///         }) if err.is::<SampleErr>()
/// ));
///
/// let res_msg: Result<()> = parse_err!(Location::Unknown, "Some formatted {}", 0);
/// assert_eq!(
///     res_msg.unwrap_err().err.to_string(),
///     "Some formatted 0"
/// );
/// ```
#[macro_export]
macro_rules! parse_err {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_err!($loc, $crate::result::ErrorKind::Parse, $($t)*)
    }
}

/// Create [ErrorKind::Codegen] [struct@Error] from any [std::error::Error] object.
#[macro_export]
macro_rules! codegen_error {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_error!($loc, $crate::result::ErrorKind::Codegen, $($t)*)
    }
}

/// Create [ErrorKind::Codegen] [Result] from any [std::error::Error] object.
#[macro_export]
macro_rules! codegen_err {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_err!($loc, $crate::result::ErrorKind::Codegen, $($t)*)
    }
}

/// Create [ErrorKind::VerificationFailed] [struct@Error] from any [std::error::Error] object.
#[macro_export]
macro_rules! verify_error {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_error!($loc, $crate::result::ErrorKind::VerificationFailed, $($t)*)
    }
}

/// Create [ErrorKind::VerificationFailed] [Result] from any [std::error::Error] object.
#[macro_export]
macro_rules! verify_err {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_err!($loc, $crate::result::ErrorKind::VerificationFailed, $($t)*)
    }
}

/// Create [ErrorKind::Link] [struct@Error] from any [std::error::Error] object.
#[macro_export]
macro_rules! link_error {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_error!($loc, $crate::result::ErrorKind::Link, $($t)*)
    }
}

/// Create [ErrorKind::Link] [Result] from any [std::error::Error] object.
#[macro_export]
macro_rules! link_err {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_err!($loc, $crate::result::ErrorKind::Link, $($t)*)
    }
}

/// Create [ErrorKind::Backend] [struct@Error] from any [std::error::Error] object.
#[macro_export]
macro_rules! backend_error {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_error!($loc, $crate::result::ErrorKind::Backend, $($t)*)
    }
}

/// Create [ErrorKind::Backend] [Result] from any [std::error::Error] object.
#[macro_export]
macro_rules! backend_err {
    ($loc: expr, $($t:tt)*) => {
        $crate::create_err!($loc, $crate::result::ErrorKind::Backend, $($t)*)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        location::Location,
        result::{Error, ErrorKind, Result},
    };

    #[derive(thiserror::Error, Debug)]
    #[error("sample error")]
    struct SampleErr;

    #[test]
    fn kinds_and_downcast() {
        let err = codegen_error!(Location::Unknown, SampleErr);
        assert_eq!(err.kind, ErrorKind::Codegen);
        assert!(err.err.is::<SampleErr>());
        assert_eq!(err.to_string(), "code generation failed: sample error");

        let res: Result<()> = link_err!(Location::SrcPos { line: 3, column: 7 }, "no {}", "foo");
        match res {
            Err(Error { kind, err, loc, .. }) => {
                assert_eq!(kind, ErrorKind::Link);
                assert_eq!(err.to_string(), "no foo");
                assert_eq!(loc.to_string(), "3:7");
            }
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn display_includes_known_location() {
        let err = parse_error!(Location::SrcPos { line: 1, column: 2 }, "expected then");
        assert_eq!(err.to_string(), "[1:2] parse error: expected then");
    }
}
