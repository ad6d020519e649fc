//! FTP Protocol implementation
//!
//! Handles verb formatting, reply decoding and directory listing parsing.

pub mod commands;
pub mod listing;
pub mod parser;
pub mod responses;

pub use commands::{UnknownVerb, Verb};
pub use listing::{EntryType, FileEntry, ListingDecoder, Permissions, UnixListingParser};
pub use parser::{LineReplyDecoder, ReplyDecoder};
pub use responses::Response;
