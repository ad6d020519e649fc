//! Error types
//!
//! Defines the error taxonomy surfaced by the FTP client.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by client operations.
///
/// Cloneable so one outcome can be handed to every caller waiting on it
/// (authentication waiters, commands failed by a dropped connection).
#[derive(Debug, Clone, Error)]
pub enum FtpError {
    /// Transport connect/read/write failure on the control or data connection.
    #[error("connection error: {0}")]
    Connection(#[source] Arc<io::Error>),

    /// The control connection went away before the command got its reply.
    #[error("control connection closed")]
    ConnectionClosed,

    /// The server answered with a reply code above 399.
    #[error("server error {code}: {text}")]
    Protocol { code: u16, text: String },

    /// USER/PASS/ACCT exchange was rejected.
    #[error("login not accepted: {0}")]
    Login(String),

    /// PASV was refused or its reply did not carry a usable address.
    #[error("PASV: {0}")]
    PassiveMode(String),

    /// Local file open/read/write failure.
    #[error("local file {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// A preliminary mark was expected but another code arrived.
    #[error("unexpected reply {code}: {text}")]
    UnexpectedReply { code: u16, text: String },

    /// A data transfer verb was sent without the transfer operation that
    /// opens its data channel.
    #[error("{0} needs a data channel, use list/get/put instead")]
    NeedsDataChannel(String),

    /// An operation outlived the configured response timeout.
    #[error("server took longer than {0:?} to respond")]
    Timeout(Duration),
}

impl FtpError {
    /// Server reply code carried by this error, if any.
    pub fn code(&self) -> Option<u16> {
        match self {
            FtpError::Protocol { code, .. } | FtpError::UnexpectedReply { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the error means the control connection is no longer usable.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, FtpError::Connection(_) | FtpError::ConnectionClosed)
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FtpError::LocalIo {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

impl From<io::Error> for FtpError {
    fn from(error: io::Error) -> Self {
        FtpError::Connection(Arc::new(error))
    }
}

/// Session registry errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session id: {0}")]
    UnknownSession(u64),

    #[error("maximum number of sessions ({0}) reached")]
    SessionLimit(usize),

    #[error(transparent)]
    Ftp(#[from] FtpError),
}

pub type FtpResult<T> = Result<T, FtpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_exposes_code() {
        let err = FtpError::Protocol {
            code: 550,
            text: "550 No such file".into(),
        };
        assert_eq!(err.code(), Some(550));
        assert!(!err.is_connection_error());
    }

    #[test]
    fn io_errors_map_to_connection_errors() {
        let err: FtpError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(err.is_connection_error());
        assert_eq!(err.code(), None);
        assert!(err.clone().to_string().contains("reset"));
    }
}
