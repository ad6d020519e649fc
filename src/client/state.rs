//! Module `state`
//!
//! Per-connection client state: authentication progress, cached server
//! features and system type, the active transfer type, and the callers
//! waiting for an authentication in progress.

use std::collections::HashSet;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::FtpError;
use crate::transfer::TransferType;

/// Receives the outcome of an authentication attempt.
pub type AuthWaiter = oneshot::Sender<Result<(), FtpError>>;

#[derive(Debug, Default)]
pub struct ConnectionState {
    authenticated: bool,
    authenticating: bool,
    features: Option<HashSet<String>>,
    system: Option<String>,
    transfer_type: Option<TransferType>,
    pending_auth_waiters: Vec<AuthWaiter>,
    use_list: bool,
    username: Option<String>,
    keepalive: Option<JoinHandle<()>>,
}

impl ConnectionState {
    /// Forgets the login; called whenever a new control socket is opened.
    pub fn reset_authentication(&mut self) {
        self.authenticated = false;
        self.transfer_type = None;
    }

    /// Clears everything tied to the connection and stops the keepalive.
    pub fn clear(&mut self) {
        if let Some(keepalive) = self.keepalive.take() {
            keepalive.abort();
        }
        self.authenticated = false;
        self.features = None;
        self.system = None;
        self.transfer_type = None;
        self.username = None;
    }

    // --------------------
    // Authentication
    // --------------------

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_authenticating(&self) -> bool {
        self.authenticating
    }

    /// Queues a waiter. Returns `true` when no attempt is running yet and
    /// the caller has to start one.
    pub fn join_authentication(&mut self, waiter: AuthWaiter) -> bool {
        self.pending_auth_waiters.push(waiter);
        if self.authenticating {
            false
        } else {
            self.authenticating = true;
            true
        }
    }

    /// Ends the running attempt and hands back every waiter, in arrival order.
    pub fn finish_authentication(&mut self, username: Option<String>) -> Vec<AuthWaiter> {
        self.authenticating = false;
        if username.is_some() {
            self.authenticated = true;
            self.username = username;
        }
        std::mem::take(&mut self.pending_auth_waiters)
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    // --------------------
    // Server features
    // --------------------

    pub fn features(&self) -> Option<&HashSet<String>> {
        self.features.as_ref()
    }

    pub fn set_features(&mut self, features: HashSet<String>) {
        self.features = Some(features);
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features
            .as_ref()
            .is_some_and(|f| f.contains(&feature.to_lowercase()))
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn set_system(&mut self, system: Option<String>) {
        self.system = system;
    }

    // --------------------
    // Transfers
    // --------------------

    pub fn transfer_type(&self) -> Option<TransferType> {
        self.transfer_type
    }

    pub fn set_transfer_type(&mut self, transfer_type: Option<TransferType>) {
        self.transfer_type = transfer_type;
    }

    /// Whether `ls` has to fall back to `LIST` because `STAT` is unusable.
    pub fn use_list(&self) -> bool {
        self.use_list
    }

    pub fn set_use_list(&mut self, use_list: bool) {
        self.use_list = use_list;
    }

    /// Installs a keepalive task, cancelling the previous one.
    pub fn replace_keepalive(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.keepalive.replace(task) {
            previous.abort();
        }
    }
}
