use std::path::PathBuf;

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Index not found: {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Index I/O failure while {context}: {source}")]
    IndexIo {
        context: &'static str,
        #[source]
        source: BoxedSource,
    },

    #[error("Index is closed")]
    IndexClosed,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn index_io<E>(context: &'static str, source: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        Self::IndexIo { context, source: source.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attaches an operation label to a foreign error, turning it into
/// [`Error::IndexIo`].
pub trait IoContext<T> {
    fn io_context(self, context: &'static str) -> Result<T>;
}

impl<T, E> IoContext<T> for std::result::Result<T, E>
where
    E: Into<BoxedSource>,
{
    fn io_context(self, context: &'static str) -> Result<T> {
        self.map_err(|e| Error::index_io(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_context_keeps_the_cause() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        let err = res.io_context("reloading reader").unwrap_err();
        assert!(matches!(err, Error::IndexIo { context: "reloading reader", .. }));
        assert!(err.to_string().contains("disk gone"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
