//! RAX FTP client
//!
//! Asynchronous FTP client: one control connection per [`FtpClient`],
//! replies matched to commands in submission order, passive-mode data
//! channels for listings and file transfers.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod shell;
pub mod transfer;

pub use client::{ClientEvent, FtpClient, SessionId, SessionManager};
pub use config::ClientConfig;
pub use error::{FtpError, FtpResult, SessionError};
pub use protocol::{FileEntry, Response, Verb};
pub use transfer::{DataChannel, PutSource, TransferType};
