//! FTP client
//!
//! Control connection plumbing, command/reply correlation, session state
//! and the public client handle.

pub mod connection;
pub mod correlator;
pub mod events;
pub mod handler;
pub mod queue;
pub mod registry;
pub mod state;

pub use events::{ClientEvent, TransferAction, TransferProgress};
pub use handler::FtpClient;
pub use registry::{SessionId, SessionManager};
