//! Control connection
//!
//! One task per control socket. It owns the socket, the command queue and
//! the reply correlator: commands arrive over a channel, are written one at
//! a time, and every received line is decoded and correlated with the
//! in-flight command.

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::correlator::{Correlation, ReplyCorrelator};
use crate::client::events::{ClientEvent, EventBus};
use crate::client::queue::{Command, CommandQueue};
use crate::error::FtpError;
use crate::protocol::{ReplyDecoder, Response};
use crate::protocol::commands::loggable;

/// Handle to a running control connection task.
pub(crate) struct ControlConnection {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ControlConnection {
    /// Connects to the server's command port and starts the connection task.
    pub(crate) async fn open(
        host: &str,
        port: u16,
        decoder: Box<dyn ReplyDecoder>,
        events: EventBus,
    ) -> Result<Self, FtpError> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            warn!("Failed to connect to {}:{}: {}", host, port, e);
            FtpError::from(e)
        })?;
        info!("Control connection established with {}:{}", host, port);

        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(stream, rx, decoder, events));
        Ok(Self { commands, task })
    }

    /// Hands a command to the connection task. Fails the command when the
    /// task has already stopped.
    pub(crate) fn submit(&self, command: Command) {
        if let Err(mpsc::error::SendError(command)) = self.commands.send(command) {
            command.fail(FtpError::ConnectionClosed);
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.commands.is_closed() || self.task.is_finished()
    }
}

impl Drop for ControlConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Session {
    writer: OwnedWriteHalf,
    queue: CommandQueue,
    correlator: ReplyCorrelator,
    events: EventBus,
}

impl Session {
    async fn transmit(&mut self, line: Option<String>) -> Result<(), FtpError> {
        let Some(line) = line else {
            return Ok(());
        };
        debug!("--> {}", loggable(&line));
        self.writer.write_all(format!("{line}\r\n").as_bytes()).await?;
        self.writer.flush().await?;
        self.events.emit(ClientEvent::CommandSent(line));
        Ok(())
    }

    async fn on_command(&mut self, command: Command) -> Result<(), FtpError> {
        let line = self.queue.enqueue(command);
        self.transmit(line).await
    }

    async fn on_reply(&mut self, reply: Response) -> Result<(), FtpError> {
        match self.correlator.correlate(&mut self.queue, reply) {
            Correlation::Discarded => Ok(()),
            Correlation::Completed { command, outcome } => {
                command.respond(outcome);
                let line = self.queue.advance();
                self.transmit(line).await
            }
        }
    }

    fn fail_all(&mut self, error: FtpError) {
        for command in self.queue.drain() {
            command.fail(error.clone());
        }
    }
}

async fn run(
    stream: TcpStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut decoder: Box<dyn ReplyDecoder>,
    events: EventBus,
) {
    let (read_half, writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut session = Session {
        writer,
        queue: CommandQueue::new(),
        correlator: ReplyCorrelator::new(),
        events: events.clone(),
    };

    let failure = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    if let Err(e) = session.on_command(command).await {
                        break e;
                    }
                }
                None => {
                    debug!("Client handle dropped, closing control connection");
                    session.fail_all(FtpError::ConnectionClosed);
                    return;
                }
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    debug!("<-- {}", line);
                    events.emit(ClientEvent::DataLineReceived(line.clone()));
                    if let Some(reply) = decoder.decode(&line) {
                        if let Err(e) = session.on_reply(reply).await {
                            break e;
                        }
                    }
                }
                Ok(None) => break FtpError::ConnectionClosed,
                Err(e) => break FtpError::from(e),
            },
        }
    };

    if session.queue.is_empty() {
        info!("Control connection ended: {}", failure);
    } else {
        error!("Control connection failed with commands pending: {}", failure);
    }
    events.emit(ClientEvent::TransportError(failure.to_string()));
    commands.close();
    session.fail_all(failure.clone());
    while let Some(command) = commands.recv().await {
        command.fail(failure.clone());
    }
}
