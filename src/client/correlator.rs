//! Reply correlation
//!
//! Matches decoded replies against the head of the command queue. Data
//! transfer verbs complete on their preliminary mark (125/150); the `226`
//! that later closes the transfer is swallowed once instead of being taken
//! as the reply to whatever command is queued next.

use log::{debug, trace};

use crate::client::queue::{Command, CommandQueue};
use crate::error::FtpError;
use crate::protocol::Response;
use crate::protocol::responses::{self, READY, TRANSFER_COMPLETE};

/// Outcome of feeding one reply to the correlator.
#[derive(Debug)]
pub enum Correlation {
    /// Not a reply to the head command; queue unchanged.
    Discarded,
    /// The head command got its final reply and left the queue.
    Completed {
        command: Command,
        outcome: Result<Response, FtpError>,
    },
}

/// Per-connection correlation state.
#[derive(Debug, Default)]
pub struct ReplyCorrelator {
    ignore_code: Option<u16>,
}

impl ReplyCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Code currently armed for suppression.
    pub fn ignore_code(&self) -> Option<u16> {
        self.ignore_code
    }

    pub fn correlate(&mut self, queue: &mut CommandQueue, response: Response) -> Correlation {
        let code = response.code;

        // Banners are never replies.
        if code == READY {
            trace!("Discarding banner: {}", response.text);
            return Correlation::Discarded;
        }

        let Some(next) = queue.head() else {
            if self.ignore_code == Some(code) {
                self.ignore_code = None;
            }
            trace!("Discarding reply with no pending command: {}", response.text);
            return Correlation::Discarded;
        };

        let mut arm = None;
        if responses::is_mark(code) || code == TRANSFER_COMPLETE {
            match &next.expectation {
                Some(expectation) if expectation.accepts(code) => {
                    arm = expectation.ignore_code;
                }
                _ => {
                    debug!("Ignoring unexpected transitional reply {}", code);
                    return Correlation::Discarded;
                }
            }
        }

        if arm.is_none() && self.ignore_code == Some(code) {
            debug!("Suppressing duplicate completion reply {}", code);
            self.ignore_code = None;
            return Correlation::Discarded;
        }

        self.ignore_code = arm;

        let Some(mut command) = queue.complete_head() else {
            return Correlation::Discarded;
        };

        let outcome = if response.is_error() {
            Err(FtpError::Protocol {
                code,
                text: response.text,
            })
        } else {
            if response.is_mark() {
                if let Some(trailer) = command.take_trailer() {
                    queue.install_in_flight(trailer);
                }
            }
            Ok(response)
        };

        Correlation::Completed { command, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::queue::MarkExpectation;
    use tokio::sync::oneshot;

    type Rx = oneshot::Receiver<Result<Response, FtpError>>;

    fn transfer_expectation() -> MarkExpectation {
        MarkExpectation::new(&[125, 150]).ignoring(226)
    }

    fn push(queue: &mut CommandQueue, text: &str, expectation: Option<MarkExpectation>) -> Rx {
        let (command, rx) = Command::new(text, expectation);
        queue.enqueue(command);
        rx
    }

    fn feed(
        correlator: &mut ReplyCorrelator,
        queue: &mut CommandQueue,
        code: u16,
        text: &str,
    ) -> Option<(String, Result<Response, FtpError>)> {
        match correlator.correlate(queue, Response::new(code, text)) {
            Correlation::Discarded => None,
            Correlation::Completed { command, outcome } => {
                queue.advance();
                Some((command.text.clone().unwrap_or_default(), outcome))
            }
        }
    }

    #[test]
    fn mark_completes_command_and_swallows_226_once() {
        let mut queue = CommandQueue::new();
        let mut correlator = ReplyCorrelator::new();
        push(&mut queue, "LIST", Some(transfer_expectation()));
        push(&mut queue, "TYPE I", None);

        let (text, outcome) = feed(&mut correlator, &mut queue, 150, "150 Here comes").unwrap();
        assert_eq!(text, "LIST");
        assert_eq!(outcome.unwrap().code, 150);
        assert_eq!(correlator.ignore_code(), Some(226));

        assert!(feed(&mut correlator, &mut queue, 226, "226 Done").is_none());
        assert_eq!(queue.len(), 1);

        let (text, outcome) = feed(&mut correlator, &mut queue, 200, "200 Type set").unwrap();
        assert_eq!(text, "TYPE I");
        assert!(outcome.is_ok());
        assert!(queue.is_empty());
    }

    #[test]
    fn armed_226_is_consumed_when_queue_is_empty() {
        let mut queue = CommandQueue::new();
        let mut correlator = ReplyCorrelator::new();
        push(&mut queue, "RETR a.txt", Some(transfer_expectation()));

        assert!(feed(&mut correlator, &mut queue, 125, "125 Go").is_some());
        assert!(feed(&mut correlator, &mut queue, 226, "226 Done").is_none());
        assert_eq!(correlator.ignore_code(), None);
    }

    #[test]
    fn banner_never_completes_a_command() {
        let mut queue = CommandQueue::new();
        let mut correlator = ReplyCorrelator::new();
        assert!(feed(&mut correlator, &mut queue, 220, "220 Welcome").is_none());

        push(&mut queue, "NOOP", None);
        assert!(feed(&mut correlator, &mut queue, 220, "220 Welcome").is_none());
        assert_eq!(queue.len(), 1);
        assert!(feed(&mut correlator, &mut queue, 200, "200 NOOP ok").is_some());
    }

    #[test]
    fn unexpected_marks_are_ignored() {
        let mut queue = CommandQueue::new();
        let mut correlator = ReplyCorrelator::new();
        push(&mut queue, "PWD", None);

        assert!(feed(&mut correlator, &mut queue, 150, "150 stray").is_none());
        assert!(feed(&mut correlator, &mut queue, 226, "226 stray").is_none());
        let (_, outcome) = feed(&mut correlator, &mut queue, 257, "257 \"/\"").unwrap();
        assert_eq!(outcome.unwrap().code, 257);
    }

    #[test]
    fn codes_above_399_are_errors() {
        let mut queue = CommandQueue::new();
        let mut correlator = ReplyCorrelator::new();
        for code in [400u16, 421, 500, 550, 599] {
            push(&mut queue, "DELE x", None);
            let (_, outcome) = feed(&mut correlator, &mut queue, code, "failure").unwrap();
            assert_eq!(outcome.unwrap_err().code(), Some(code));
        }
        for code in [200u16, 250, 331, 350, 399] {
            push(&mut queue, "DELE x", None);
            let (_, outcome) = feed(&mut correlator, &mut queue, code, "fine").unwrap();
            assert_eq!(outcome.unwrap().code, code);
        }
    }

    #[test]
    fn error_instead_of_mark_completes_transfer_command() {
        let mut queue = CommandQueue::new();
        let mut correlator = ReplyCorrelator::new();
        push(&mut queue, "RETR missing", Some(transfer_expectation()));

        let (_, outcome) = feed(&mut correlator, &mut queue, 550, "550 No such file").unwrap();
        assert_eq!(outcome.unwrap_err().code(), Some(550));
        assert_eq!(correlator.ignore_code(), None);
    }

    #[test]
    fn store_trailer_receives_the_final_226() {
        let mut queue = CommandQueue::new();
        let mut correlator = ReplyCorrelator::new();
        let (stor, _mark) = Command::new("STOR a.txt", Some(MarkExpectation::new(&[125, 150])));
        let (stor, _done) = stor.with_trailer(MarkExpectation::new(&[226]));
        queue.enqueue(stor);
        push(&mut queue, "NOOP", None);

        let (text, outcome) = feed(&mut correlator, &mut queue, 150, "150 Ok to send").unwrap();
        assert_eq!(text, "STOR a.txt");
        assert!(outcome.is_ok());
        assert_eq!(queue.len(), 2);
        assert!(queue.head().unwrap().text.is_none());

        let (text, outcome) = feed(&mut correlator, &mut queue, 226, "226 Received").unwrap();
        assert_eq!(text, "");
        assert_eq!(outcome.unwrap().code, 226);
        assert_eq!(queue.head().unwrap().text.as_deref(), Some("NOOP"));
    }
}
