//! FTP Response handling
//!
//! Defines the decoded reply type and the reply codes the client reacts to.

/// Standard FTP reply codes
pub const DATA_CONNECTION_OPEN: u16 = 125;
pub const FILE_STATUS_OK: u16 = 150;
pub const OK: u16 = 200;
pub const NOT_IMPLEMENTED_SUPERFLUOUS: u16 = 202;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const LOGIN_SUCCESS: u16 = 230;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const ACCOUNT_REQUIRED: u16 = 332;
pub const SYNTAX_ERROR: u16 = 500;
pub const NOT_IMPLEMENTED: u16 = 502;

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    /// Full reply body; multi-line replies keep every line, joined by `\n`.
    pub text: String,
}

impl Response {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// Preliminary replies (101..=199) announce progress, not completion.
    pub fn is_mark(&self) -> bool {
        is_mark(self.code)
    }

    /// Every code above 399 is treated as an error; many servers do not
    /// follow RFC 959 closely enough to be more precise.
    pub fn is_error(&self) -> bool {
        self.code > 399
    }
}

pub fn is_mark(code: u16) -> bool {
    code > 100 && code < 200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_codes() {
        assert!(Response::new(150, "150 Opening").is_mark());
        assert!(!Response::new(100, "100").is_mark());
        assert!(!Response::new(226, "226 Done").is_mark());
        assert!(Response::new(550, "550 Nope").is_error());
        assert!(Response::new(400, "400").is_error());
        assert!(!Response::new(399, "399").is_error());
    }
}
