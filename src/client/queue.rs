//! Command queue
//!
//! Pending commands of one control connection, in submission order. At most
//! one command is in flight: it has been written (or, for an await-only
//! command, installed) and waits for its final reply. Later commands are
//! only written once the head has completed.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use crate::error::FtpError;
use crate::protocol::Response;

/// Receives the final outcome of a command.
pub type Responder = oneshot::Sender<Result<Response, FtpError>>;

/// Preliminary codes a command accepts as its completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkExpectation {
    pub marks: Vec<u16>,
    /// Code to swallow once after one of `marks` was accepted.
    pub ignore_code: Option<u16>,
}

impl MarkExpectation {
    pub fn new(marks: &[u16]) -> Self {
        Self {
            marks: marks.to_vec(),
            ignore_code: None,
        }
    }

    pub fn ignoring(mut self, code: u16) -> Self {
        self.ignore_code = Some(code);
        self
    }

    pub fn accepts(&self, code: u16) -> bool {
        self.marks.contains(&code)
    }
}

/// A command waiting in the queue.
#[derive(Debug)]
pub struct Command {
    /// Line to write, without CRLF. `None` for a command that only awaits
    /// a reply to something already sent.
    pub text: Option<String>,
    pub expectation: Option<MarkExpectation>,
    responder: Responder,
    /// Installed in place of this command when it completes successfully
    /// on a preliminary mark.
    trailer: Option<Box<Command>>,
}

impl Command {
    pub fn new(
        text: impl Into<String>,
        expectation: Option<MarkExpectation>,
    ) -> (Self, oneshot::Receiver<Result<Response, FtpError>>) {
        let (responder, rx) = oneshot::channel();
        let command = Self {
            text: Some(text.into()),
            expectation,
            responder,
            trailer: None,
        };
        (command, rx)
    }

    /// Attaches an await-only command that takes over the in-flight slot
    /// after this command's preliminary mark, and receives the reply that
    /// closes the exchange.
    pub fn with_trailer(
        mut self,
        expectation: MarkExpectation,
    ) -> (Self, oneshot::Receiver<Result<Response, FtpError>>) {
        let (responder, rx) = oneshot::channel();
        self.trailer = Some(Box::new(Command {
            text: None,
            expectation: Some(expectation),
            responder,
            trailer: None,
        }));
        (self, rx)
    }

    pub(crate) fn take_trailer(&mut self) -> Option<Command> {
        self.trailer.take().map(|t| *t)
    }

    /// Delivers the outcome. A caller that stopped waiting is not an error.
    pub fn respond(self, outcome: Result<Response, FtpError>) {
        if let Some(trailer) = self.trailer {
            if let Err(e) = &outcome {
                trailer.respond(Err(e.clone()));
            }
        }
        let _ = self.responder.send(outcome);
    }

    /// Fails the command and any trailer.
    pub fn fail(self, error: FtpError) {
        self.respond(Err(error));
    }
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<Command>,
    in_flight: bool,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command. Returns the line to transmit when the new command
    /// became the in-flight head.
    pub fn enqueue(&mut self, command: Command) -> Option<String> {
        self.pending.push_back(command);
        self.dispatch()
    }

    /// Moves on to the next command after the head completed. Returns the
    /// line to transmit, if the new head has one.
    pub fn advance(&mut self) -> Option<String> {
        self.dispatch()
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.in_flight {
            return None;
        }
        let head = self.pending.front()?;
        self.in_flight = true;
        head.text.clone()
    }

    pub fn head(&self) -> Option<&Command> {
        self.pending.front()
    }

    /// Removes the head once its final reply arrived.
    pub fn complete_head(&mut self) -> Option<Command> {
        let head = self.pending.pop_front()?;
        self.in_flight = false;
        Some(head)
    }

    /// Puts an await-only command at the head, already in flight.
    pub fn install_in_flight(&mut self, command: Command) {
        self.pending.push_front(command);
        self.in_flight = true;
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Empties the queue, handing every command back to the caller.
    pub fn drain(&mut self) -> Vec<Command> {
        self.in_flight = false;
        self.pending.drain(..).collect()
    }
}
