//! Reply decoding
//!
//! Turns raw control-connection lines into structured [`Response`]s.

use crate::protocol::responses::Response;

/// Decodes control-connection lines into replies.
///
/// Called once per received line. Returns `None` while a reply is still
/// incomplete (inside a multi-line block) or when the line is not a reply.
pub trait ReplyDecoder: Send {
    fn decode(&mut self, line: &str) -> Option<Response>;
}

/// RFC 959 reply decoder.
///
/// A line `ddd-text` opens a multi-line reply which ends at the first line
/// starting with the same code followed by a space. The decoded text keeps
/// every line of the reply, code prefixes included.
#[derive(Debug, Default)]
pub struct LineReplyDecoder {
    pending: Option<(u16, Vec<String>)>,
}

impl LineReplyDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

fn reply_code(line: &str) -> Option<(u16, u8)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let code = line[..3].parse::<u16>().ok()?;
    if !(100..600).contains(&code) {
        return None;
    }
    let separator = bytes.get(3).copied().unwrap_or(b' ');
    Some((code, separator))
}

impl ReplyDecoder for LineReplyDecoder {
    fn decode(&mut self, line: &str) -> Option<Response> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some((code, lines)) = self.pending.as_mut() {
            lines.push(line.to_string());
            if let Some((end_code, b' ')) = reply_code(line) {
                if end_code == *code {
                    let (code, lines) = self.pending.take()?;
                    return Some(Response::new(code, lines.join("\n")));
                }
            }
            return None;
        }

        if line.is_empty() {
            return None;
        }

        match reply_code(line)? {
            (code, b'-') => {
                self.pending = Some((code, vec![line.to_string()]));
                None
            }
            (code, _) => Some(Response::new(code, line)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_line_replies() {
        let mut decoder = LineReplyDecoder::new();
        let reply = decoder.decode("230 Login successful.\r").unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(reply.text, "230 Login successful.");
    }

    #[test]
    fn collects_multi_line_replies() {
        let mut decoder = LineReplyDecoder::new();
        assert_eq!(decoder.decode("211-Features:"), None);
        assert_eq!(decoder.decode(" MDTM"), None);
        assert_eq!(decoder.decode(" 200 looks like a code but is indented"), None);
        assert_eq!(decoder.decode("213 other code does not close"), None);
        let reply = decoder.decode("211 End").unwrap();
        assert_eq!(reply.code, 211);
        assert_eq!(
            reply.text,
            "211-Features:\n MDTM\n 200 looks like a code but is indented\n213 other code does not close\n211 End"
        );
    }

    #[test]
    fn ignores_noise_and_partial_lines() {
        let mut decoder = LineReplyDecoder::new();
        assert_eq!(decoder.decode(""), None);
        assert_eq!(decoder.decode("hello"), None);
        assert_eq!(decoder.decode("99"), None);
        assert_eq!(decoder.decode("999 out of range"), None);
        assert_eq!(decoder.decode("200").map(|r| r.code), Some(200));
    }
}
