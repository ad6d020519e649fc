//! Transfer module for the FTP client
//!
//! Passive data channels, representation types and the local side of
//! uploads and downloads.

pub mod data_channel;
pub mod file_ops;
pub mod modes;

pub use data_channel::{DataChannel, parse_pasv_reply};
pub use file_ops::PutSource;
pub use modes::TransferType;
