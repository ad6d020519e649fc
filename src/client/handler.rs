//! FTP client handle
//!
//! [`FtpClient`] is the public entry point. It is cheap to clone; every
//! clone drives the same control connection, so commands issued from
//! independent tasks are serialized onto one socket in the order they are
//! submitted.
//!
//! Any command other than FEAT, SYST, USER and PASS first makes sure the
//! server features are known and the session is logged in. Concurrent
//! callers arriving during a login wait for that login instead of starting
//! their own.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast, oneshot};
use tokio::time::{Instant, interval_at};

use crate::client::connection::ControlConnection;
use crate::client::events::{ClientEvent, EventBus, TransferAction};
use crate::client::queue::{Command, MarkExpectation};
use crate::client::state::ConnectionState;
use crate::config::ClientConfig;
use crate::error::{FtpError, FtpResult};
use crate::protocol::responses::{
    ACCOUNT_REQUIRED, DATA_CONNECTION_OPEN, FILE_STATUS_OK, LOGIN_SUCCESS,
    NOT_IMPLEMENTED, NOT_IMPLEMENTED_SUPERFLUOUS, PASSWORD_REQUIRED, SYNTAX_ERROR, SYSTEM_TYPE,
    TRANSFER_COMPLETE,
};
use crate::protocol::{
    FileEntry, LineReplyDecoder, ListingDecoder, ReplyDecoder, Response, UnixListingParser, Verb,
};
use crate::transfer::file_ops::{self, ProgressReporter, PutSource};
use crate::transfer::{DataChannel, TransferType, parse_pasv_reply};

type DecoderFactory = dyn Fn() -> Box<dyn ReplyDecoder> + Send + Sync;

/// Systems known to answer STAT badly even though they accept it.
const STAT_UNFRIENDLY_SYSTEMS: [&str; 1] = ["hummingbird"];

struct ClientInner {
    config: ClientConfig,
    control: Mutex<Option<ControlConnection>>,
    state: Mutex<ConnectionState>,
    feature_gate: Mutex<()>,
    transfer_slot: Arc<Mutex<()>>,
    events: EventBus,
    reply_decoder: Box<DecoderFactory>,
    listing_decoder: Box<dyn ListingDecoder>,
}

/// Asynchronous FTP client bound to one server.
#[derive(Clone)]
pub struct FtpClient {
    inner: Arc<ClientInner>,
}

fn transfer_marks() -> MarkExpectation {
    MarkExpectation::new(&[DATA_CONNECTION_OPEN, FILE_STATUS_OK]).ignoring(TRANSFER_COMPLETE)
}

fn expect_mark(reply: Response) -> FtpResult<Response> {
    match reply.code {
        DATA_CONNECTION_OPEN | FILE_STATUS_OK => Ok(reply),
        code => Err(FtpError::UnexpectedReply {
            code,
            text: reply.text,
        }),
    }
}

fn login_error(error: FtpError) -> FtpError {
    if error.is_connection_error() {
        error
    } else {
        FtpError::Login(error.to_string())
    }
}

/// Extracts feature names from a FEAT reply, skipping its first and last line.
pub fn parse_features(text: &str) -> HashSet<String> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 3 {
        return HashSet::new();
    }
    lines[1..lines.len() - 1]
        .iter()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_lowercase)
        .collect()
}

async fn receive(rx: oneshot::Receiver<Result<Response, FtpError>>) -> FtpResult<Response> {
    rx.await.map_err(|_| FtpError::ConnectionClosed)?
}

impl FtpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_decoders(
            config,
            || -> Box<dyn ReplyDecoder> { Box::new(LineReplyDecoder::new()) },
            UnixListingParser,
        )
    }

    /// Client with custom reply and listing decoders. A fresh reply decoder
    /// is created for every control connection.
    pub fn with_decoders<F, L>(config: ClientConfig, reply_decoder: F, listing_decoder: L) -> Self
    where
        F: Fn() -> Box<dyn ReplyDecoder> + Send + Sync + 'static,
        L: ListingDecoder + 'static,
    {
        Self {
            inner: Arc::new(ClientInner {
                config,
                control: Mutex::new(None),
                state: Mutex::new(ConnectionState::default()),
                feature_gate: Mutex::new(()),
                transfer_slot: Arc::new(Mutex::new(())),
                events: EventBus::new(),
                reply_decoder: Box::new(reply_decoder),
                listing_decoder: Box::new(listing_decoder),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Subscribes to command, reply line, transport and progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    // --------------------
    // Command submission
    // --------------------

    /// Hands a command to the control connection, connecting first when
    /// there is no usable socket.
    async fn dispatch(&self, command: Command) -> FtpResult<()> {
        let mut control = self.inner.control.lock().await;
        if control.as_ref().is_none_or(ControlConnection::is_closed) {
            // Dropping a stale connection aborts its task and closes the socket.
            control.take();
            self.inner.state.lock().await.reset_authentication();
            let connection = ControlConnection::open(
                &self.inner.config.host,
                self.inner.config.port,
                (self.inner.reply_decoder)(),
                self.inner.events.clone(),
            )
            .await?;
            *control = Some(connection);
        }
        if let Some(connection) = control.as_ref() {
            connection.submit(command);
        }
        Ok(())
    }

    /// Sends one command line and waits for its final reply, without any
    /// login check.
    async fn execute(&self, line: String, expectation: Option<MarkExpectation>) -> FtpResult<Response> {
        let (command, rx) = Command::new(line, expectation);
        self.dispatch(command).await?;
        receive(rx).await
    }

    /// Sends a verb once the session is ready.
    async fn execute_ready(
        &self,
        verb: Verb,
        args: &[&str],
        expectation: Option<MarkExpectation>,
    ) -> FtpResult<Response> {
        if !verb.is_bootstrap() {
            self.ensure_ready().await?;
        }
        self.execute(verb.line(args), expectation).await
    }

    /// Sends any verb with its arguments and returns the final reply.
    ///
    /// Replies with a code above 399 come back as [`FtpError::Protocol`].
    /// LIST, NLST, RETR and STOR are refused with
    /// [`FtpError::NeedsDataChannel`]; their replies belong to a transfer.
    pub async fn raw(&self, verb: Verb, args: &[&str]) -> FtpResult<Response> {
        if verb.needs_data_channel() {
            return Err(FtpError::NeedsDataChannel(verb.to_string()));
        }
        self.execute_ready(verb, args, None).await
    }

    // --------------------
    // Features and login
    // --------------------

    /// Queries FEAT and SYST once per client; later calls return the cache.
    /// A FEAT refused by the server caches an empty feature set. Nothing is
    /// cached when the server could not be reached.
    pub async fn ensure_features(&self) -> HashSet<String> {
        let _gate = self.inner.feature_gate.lock().await;
        if let Some(features) = self.inner.state.lock().await.features() {
            return features.clone();
        }

        let features = match self.execute(Verb::Feat.line(&[]), None).await {
            Ok(reply) => parse_features(&reply.text),
            Err(e) if e.is_connection_error() => {
                debug!("FEAT not sent, server unreachable: {}", e);
                return HashSet::new();
            }
            Err(e) => {
                debug!("FEAT failed, assuming no features: {}", e);
                HashSet::new()
            }
        };
        let system = match self.execute(Verb::Syst.line(&[]), None).await {
            Ok(reply) if reply.code == SYSTEM_TYPE => Some(reply.text.to_lowercase()),
            _ => None,
        };
        info!("Server features: {:?}, system: {:?}", features, system);

        let mut state = self.inner.state.lock().await;
        state.set_features(features.clone());
        state.set_system(system);
        features
    }

    /// Cached feature set, `None` until FEAT got an answer.
    pub async fn features(&self) -> Option<HashSet<String>> {
        self.inner.state.lock().await.features().cloned()
    }

    pub async fn has_feature(&self, feature: &str) -> bool {
        self.inner.state.lock().await.has_feature(feature)
    }

    /// System string reported by SYST, lower-cased.
    pub async fn system(&self) -> Option<String> {
        self.inner.state.lock().await.system().map(str::to_string)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.lock().await.is_authenticated()
    }

    /// Queries features and logs in, if not done already.
    pub async fn auth(&self) -> FtpResult<()> {
        self.ensure_ready().await
    }

    async fn ensure_ready(&self) -> FtpResult<()> {
        self.ensure_features().await;
        self.ensure_authenticated().await
    }

    /// Whether a control connection is open and its task still running.
    async fn is_connected(&self) -> bool {
        self.inner
            .control
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| !c.is_closed())
    }

    async fn ensure_authenticated(&self) -> FtpResult<()> {
        let connected = self.is_connected().await;
        let (waiter, outcome) = oneshot::channel();
        let leader = {
            let mut state = self.inner.state.lock().await;
            if !connected && !state.is_authenticating() {
                // A login does not survive its control connection.
                state.reset_authentication();
            }
            if state.is_authenticated() {
                return Ok(());
            }
            state.join_authentication(waiter)
        };

        if leader {
            // The exchange runs detached so that a caller giving up does not
            // strand the others waiting on it.
            let client = self.clone();
            tokio::spawn(async move {
                let result = client.login().await;
                let waiters = client
                    .inner
                    .state
                    .lock()
                    .await
                    .finish_authentication(result.as_ref().ok().cloned());
                for waiter in waiters {
                    let _ = waiter.send(result.clone().map(|_| ()));
                }
            });
        }

        outcome.await.map_err(|_| FtpError::ConnectionClosed)?
    }

    /// USER/PASS (and ACCT when asked for) exchange, then binary mode.
    async fn login(&self) -> FtpResult<String> {
        let user = self.inner.config.user_or_default().to_string();
        let pass = self.inner.config.pass_or_default().to_string();
        info!("Logging in as {}", user);

        let reply = self
            .execute(Verb::User.line(&[user.as_str()]), None)
            .await
            .map_err(login_error)?;
        if ![LOGIN_SUCCESS, PASSWORD_REQUIRED, ACCOUNT_REQUIRED].contains(&reply.code) {
            return Err(FtpError::Login(reply.text));
        }

        let reply = self
            .execute(Verb::Pass.line(&[pass.as_str()]), None)
            .await
            .map_err(login_error)?;
        match reply.code {
            LOGIN_SUCCESS | NOT_IMPLEMENTED_SUPERFLUOUS => {}
            ACCOUNT_REQUIRED => {
                let reply = self
                    .execute(Verb::Acct.line(&[]), None)
                    .await
                    .map_err(login_error)?;
                if ![LOGIN_SUCCESS, NOT_IMPLEMENTED_SUPERFLUOUS].contains(&reply.code) {
                    return Err(FtpError::Login(reply.text));
                }
            }
            _ => return Err(FtpError::Login(reply.text)),
        }

        match self.execute(Verb::Type.line(&["I"]), None).await {
            Ok(_) => self
                .inner
                .state
                .lock()
                .await
                .set_transfer_type(Some(TransferType::Binary)),
            Err(e) => warn!("Could not switch to binary mode after login: {}", e),
        }
        info!("Logged in as {}", user);
        Ok(user)
    }

    /// Switches the representation type, skipping the round trip when the
    /// session already uses it.
    pub async fn set_transfer_type(&self, transfer_type: TransferType) -> FtpResult<()> {
        self.ensure_ready().await?;
        if self.inner.state.lock().await.transfer_type() == Some(transfer_type) {
            return Ok(());
        }
        self.execute(Verb::Type.line(&[transfer_type.code()]), None)
            .await?;
        self.inner
            .state
            .lock()
            .await
            .set_transfer_type(Some(transfer_type));
        Ok(())
    }

    // --------------------
    // Data channels
    // --------------------

    /// Waits until no other transfer of this client holds a data channel.
    async fn acquire_transfer_slot(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.inner.transfer_slot).lock_owned().await
    }

    async fn passive_channel(&self, slot: OwnedMutexGuard<()>) -> FtpResult<DataChannel> {
        let reply = self.raw(Verb::Pasv, &[]).await?;
        let addr = parse_pasv_reply(&reply.text).ok_or_else(|| {
            warn!("Unusable PASV reply: {}", reply.text);
            FtpError::PassiveMode("bad host/port combination".into())
        })?;
        DataChannel::connect(addr, slot).await
    }

    /// Issues PASV and connects to the announced data port.
    ///
    /// The channel holds this client's transfer slot until it is dropped:
    /// other transfers on the same client wait for it.
    pub async fn open_passive_channel(&self) -> FtpResult<DataChannel> {
        let slot = self.acquire_transfer_slot().await;
        self.passive_channel(slot).await
    }

    // --------------------
    // Transfers
    // --------------------

    /// Raw `LIST` output for `path`, transferred in ASCII mode.
    pub async fn list(&self, path: &str) -> FtpResult<String> {
        let slot = self.acquire_transfer_slot().await;
        self.set_transfer_type(TransferType::Ascii).await?;
        let listing = self.list_with_slot(path, slot).await;
        if let Err(e) = self.set_transfer_type(TransferType::Binary).await {
            warn!("Could not restore binary mode after LIST: {}", e);
        }
        listing
    }

    async fn list_with_slot(&self, path: &str, slot: OwnedMutexGuard<()>) -> FtpResult<String> {
        let mut channel = self.passive_channel(slot).await?;
        let reply = self
            .execute_ready(Verb::List, &[path], Some(transfer_marks()))
            .await?;
        expect_mark(reply)?;

        let mut raw = Vec::new();
        channel.read_to_end(&mut raw).await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Starts a download and returns the data channel positioned at the
    /// first byte. Nothing is read until the caller reads from it.
    pub async fn get(&self, remote_path: &str) -> FtpResult<DataChannel> {
        let slot = self.acquire_transfer_slot().await;
        self.set_transfer_type(TransferType::Binary).await?;
        let channel = self.passive_channel(slot).await?;
        let reply = self
            .execute_ready(Verb::Retr, &[remote_path], Some(transfer_marks()))
            .await?;
        expect_mark(reply)?;
        Ok(channel)
    }

    /// Downloads `remote_path` into a local file. Returns the byte count.
    pub async fn get_to_file(
        &self,
        remote_path: &str,
        destination: impl AsRef<Path>,
    ) -> FtpResult<u64> {
        let mut channel = self.get(remote_path).await?;
        let mut progress =
            ProgressReporter::new(self.inner.events.clone(), remote_path, TransferAction::Get, 0);
        file_ops::download_to_file(
            &mut channel,
            destination.as_ref(),
            self.inner.config.buffer_size,
            &mut progress,
        )
        .await
    }

    /// Downloads `remote_path` into memory.
    pub async fn get_bytes(&self, remote_path: &str) -> FtpResult<Vec<u8>> {
        let mut channel = self.get(remote_path).await?;
        let mut contents = Vec::new();
        channel.read_to_end(&mut contents).await?;
        Ok(contents)
    }

    /// Uploads `source` to `remote_path` and returns the server's final
    /// reply to STOR (normally `226`).
    pub async fn put(&self, source: impl Into<PutSource>, remote_path: &str) -> FtpResult<Response> {
        let mut source = source.into().open().await?;
        let slot = self.acquire_transfer_slot().await;
        self.set_transfer_type(TransferType::Binary).await?;
        let mut channel = self.passive_channel(slot).await?;
        self.ensure_ready().await?;

        let (command, mark) = Command::new(
            Verb::Stor.line(&[remote_path]),
            Some(MarkExpectation::new(&[DATA_CONNECTION_OPEN, FILE_STATUS_OK])),
        );
        let (command, done) = command.with_trailer(MarkExpectation::new(&[TRANSFER_COMPLETE]));
        self.dispatch(command).await?;
        expect_mark(receive(mark).await?)?;

        let mut progress = ProgressReporter::new(
            self.inner.events.clone(),
            remote_path,
            TransferAction::Put,
            source.total_bytes,
        );
        file_ops::upload(
            &mut source,
            &mut channel,
            self.inner.config.buffer_size,
            &mut progress,
        )
        .await?;
        // The server sends its final reply once the data connection is closed.
        drop(channel);
        receive(done).await
    }

    /// Parsed directory listing. Uses STAT when the server supports it and
    /// falls back to LIST for good otherwise.
    pub async fn ls(&self, path: &str) -> FtpResult<Vec<FileEntry>> {
        if self.inner.state.lock().await.use_list() {
            return self.ls_via_list(path).await;
        }

        let stat = self.raw(Verb::Stat, &[path]).await;
        let unsupported = matches!(&stat, Err(e) if matches!(e.code(), Some(SYNTAX_ERROR | NOT_IMPLEMENTED)));
        let unfriendly = self
            .system()
            .await
            .is_some_and(|s| STAT_UNFRIENDLY_SYSTEMS.iter().any(|name| s.contains(name)));

        if unsupported || unfriendly {
            info!("STAT unusable on this server, listing with LIST from now on");
            self.inner.state.lock().await.set_use_list(true);
            return self.ls_via_list(path).await;
        }

        let reply = stat?;
        Ok(self.inner.listing_decoder.parse_entries(&reply.text))
    }

    async fn ls_via_list(&self, path: &str) -> FtpResult<Vec<FileEntry>> {
        let listing = self.list(path).await?;
        Ok(self.inner.listing_decoder.parse_entries(&listing))
    }

    /// RNFR then RNTO; RNTO is only sent when RNFR succeeded.
    pub async fn rename(&self, from: &str, to: &str) -> FtpResult<Response> {
        self.raw(Verb::Rnfr, &[from]).await?;
        self.raw(Verb::Rnto, &[to]).await
    }

    // --------------------
    // Pass-through helpers
    // --------------------

    pub async fn pwd(&self) -> FtpResult<Response> {
        self.raw(Verb::Pwd, &[]).await
    }

    pub async fn cwd(&self, path: &str) -> FtpResult<Response> {
        self.raw(Verb::Cwd, &[path]).await
    }

    pub async fn mkd(&self, path: &str) -> FtpResult<Response> {
        self.raw(Verb::Mkd, &[path]).await
    }

    pub async fn rmd(&self, path: &str) -> FtpResult<Response> {
        self.raw(Verb::Rmd, &[path]).await
    }

    pub async fn dele(&self, path: &str) -> FtpResult<Response> {
        self.raw(Verb::Dele, &[path]).await
    }

    pub async fn chmod(&self, mode: &str, path: &str) -> FtpResult<Response> {
        self.raw(Verb::Site, &["CHMOD", mode, path]).await
    }

    // --------------------
    // Lifecycle
    // --------------------

    /// Sends NOOP every `keepalive_interval_secs` until the client is
    /// destroyed or dropped. Calling it again restarts the timer.
    pub async fn keep_alive(&self) {
        let period = self.inner.config.keepalive_interval();
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let client = FtpClient { inner };
                if let Err(e) = client.raw(Verb::Noop, &[]).await {
                    warn!("Keepalive NOOP failed: {}", e);
                }
            }
        });
        self.inner.state.lock().await.replace_keepalive(task);
    }

    /// Sends QUIT when connected, then tears the connection down.
    pub async fn quit(&self) -> FtpResult<()> {
        let result = if self.is_connected().await {
            self.execute(Verb::Quit.line(&[]), None).await.map(|_| ())
        } else {
            Ok(())
        };
        self.destroy().await;
        result
    }

    /// Cancels the keepalive, closes the control socket and forgets the
    /// login and cached features. Commands still pending fail with
    /// [`FtpError::ConnectionClosed`].
    pub async fn destroy(&self) {
        self.inner.state.lock().await.clear();
        if self.inner.control.lock().await.take().is_some() {
            info!(
                "Closed control connection to {}:{}",
                self.inner.config.host, self.inner.config.port
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_parsing_skips_header_and_footer() {
        let text = "211-Features:\n MDTM\n REST STREAM\n  Size \n UTF8\n211 End";
        let features = parse_features(text);
        let expected: HashSet<String> = ["mdtm", "rest", "size", "utf8"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(features, expected);
    }

    #[test]
    fn single_line_feat_reply_has_no_features() {
        assert!(parse_features("211 no features").is_empty());
        assert!(parse_features("211-Features:\n211 End").is_empty());
    }

    #[test]
    fn transfer_replies_must_be_marks() {
        assert!(expect_mark(Response::new(150, "150 ok")).is_ok());
        assert!(expect_mark(Response::new(125, "125 ok")).is_ok());
        let err = expect_mark(Response::new(250, "250 done")).unwrap_err();
        assert!(matches!(err, FtpError::UnexpectedReply { code: 250, .. }));
    }
}
