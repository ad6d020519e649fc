//! Session registry
//!
//! Keeps several logged-in clients addressable by numeric id, up to
//! `max_sessions` at a time.

use std::collections::HashMap;
use std::future::Future;

use log::{info, warn};

use crate::client::handler::FtpClient;
use crate::config::ClientConfig;
use crate::error::{FtpError, FtpResult, SessionError};

pub type SessionId = u64;

/// Owns a set of clients, each bound to its own server session.
pub struct SessionManager {
    config: ClientConfig,
    sessions: HashMap<SessionId, FtpClient>,
    next_id: SessionId,
}

impl SessionManager {
    /// `config` supplies the session limit and the optional operation
    /// timeout used by [`SessionManager::timed`].
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Connects and logs in with `config`, then registers the client.
    pub async fn connect(&mut self, config: ClientConfig) -> Result<SessionId, SessionError> {
        if self.sessions.len() >= self.config.max_sessions {
            warn!(
                "Refusing new session to {}:{}: limit of {} reached",
                config.host, config.port, self.config.max_sessions
            );
            return Err(SessionError::SessionLimit(self.config.max_sessions));
        }

        let client = FtpClient::new(config);
        if let Err(e) = self.timed(client.auth()).await {
            client.destroy().await;
            return Err(e.into());
        }

        let id = self.next_id;
        self.next_id += 1;
        info!(
            "Session {} established with {}:{}",
            id,
            client.config().host,
            client.config().port
        );
        self.sessions.insert(id, client);
        Ok(id)
    }

    pub fn get(&self, id: SessionId) -> Result<&FtpClient, SessionError> {
        self.sessions.get(&id).ok_or(SessionError::UnknownSession(id))
    }

    /// Sends QUIT, closes the connection and forgets the session. The
    /// session is removed even when QUIT fails.
    pub async fn disconnect(&mut self, id: SessionId) -> Result<(), SessionError> {
        let client = self
            .sessions
            .remove(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        if let Err(e) = client.quit().await {
            warn!("QUIT failed for session {}: {}", id, e);
        }
        info!("Session {} closed", id);
        Ok(())
    }

    pub async fn disconnect_all(&mut self) {
        let ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        for id in ids {
            let _ = self.disconnect(id).await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of the open sessions, ascending.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Runs `operation` under the configured response timeout, if any.
    pub async fn timed<T, F>(&self, operation: F) -> FtpResult<T>
    where
        F: Future<Output = FtpResult<T>>,
    {
        match self.config.response_timeout() {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| FtpError::Timeout(limit))?,
            None => operation.await,
        }
    }
}
