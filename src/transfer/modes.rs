//! FTP transfer types
//!
//! Representation types selected with the `TYPE` command.

/// FTP representation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

impl TransferType {
    /// Argument for the `TYPE` command.
    pub fn code(&self) -> &'static str {
        match self {
            TransferType::Ascii => "A",
            TransferType::Binary => "I",
        }
    }
}
