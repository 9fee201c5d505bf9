// This file is part of flvdemux.
//
// Error type and `err!`/`bail!` macros, giving call sites a uniform
// `err!(Kind, msg("..."), source(e))` shape without pulling in an external
// error-builder crate.

use std::fmt;

/// Error kind. A small, reused-everywhere classification, trimmed to what
/// this crate actually throws.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The byte stream does not start with a valid FLV header.
    InvalidContainer,

    /// A bug-class failure: an invariant the core is supposed to maintain
    /// itself violated (e.g. an arithmetic conversion that should always
    /// fit).
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::InvalidContainer => "invalid container",
            ErrorKind::Internal => "internal",
        })
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    msg: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            msg: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[doc(hidden)]
    pub fn with_msg(mut self, msg: String) -> Self {
        self.msg = Some(msg);
        self
    }

    #[doc(hidden)]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.msg, &self.source) {
            (Some(m), Some(s)) => write!(f, "{}: {m}: {s}", self.kind),
            (Some(m), None) => write!(f, "{}: {m}", self.kind),
            (None, Some(s)) => write!(f, "{}: {s}", self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Builds an [`Error`] without returning from the enclosing function.
///
/// ```ignore
/// err!(InvalidContainer, msg("bad signature"))
/// err!(Internal, msg("index {i} out of range"), source(e))
/// ```
#[macro_export]
macro_rules! err {
    ($kind:ident) => {
        $crate::Error::new($crate::ErrorKind::$kind)
    };
    ($kind:ident, msg($($msg:tt)+)) => {
        $crate::Error::new($crate::ErrorKind::$kind).with_msg(format!($($msg)+))
    };
    ($kind:ident, source($source:expr)) => {
        $crate::Error::new($crate::ErrorKind::$kind).with_source($source)
    };
    ($kind:ident, msg($($msg:tt)+), source($source:expr)) => {
        $crate::Error::new($crate::ErrorKind::$kind)
            .with_msg(format!($($msg)+))
            .with_source($source)
    };
}

/// Like [`err!`], but returns `Err(..)` from the enclosing function.
#[macro_export]
macro_rules! bail {
    ($($rest:tt)+) => {
        return Err($crate::err!($($rest)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_msg_and_source() {
        let source_err = std::io::Error::new(std::io::ErrorKind::Other, "disk fell over");
        let e = err!(Internal, msg("loading {}", "thing"), source(source_err));
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert_eq!(e.to_string(), "internal: loading thing: disk fell over");
    }

    #[test]
    fn bail_returns_early() {
        fn f() -> Result<(), Error> {
            bail!(InvalidContainer, msg("bad signature"));
        }
        let e = f().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidContainer);
    }
}
