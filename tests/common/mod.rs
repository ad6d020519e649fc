//! In-process FTP server for integration tests.
//!
//! Serves a small in-memory file tree over real sockets on 127.0.0.1 and
//! records every command line it receives.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

use rax_ftp_client::ClientConfig;

/// How the server answers.
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub password: String,
    pub require_account: bool,
    pub stat_supported: bool,
    pub system: String,
    /// Replaces the computed `227` reply when set.
    pub pasv_reply: Option<String>,
    pub login_delay: Duration,
    /// Closes the control connection without replying when this verb arrives.
    pub hang_up_on: Option<String>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            password: "@anonymous".to_string(),
            require_account: false,
            stat_supported: true,
            system: "UNIX Type: L8".to_string(),
            pasv_reply: None,
            login_delay: Duration::ZERO,
            hang_up_on: None,
        }
    }
}

#[derive(Default)]
struct ServerState {
    commands: Vec<String>,
    files: BTreeMap<String, Vec<u8>>,
    connections: usize,
}

pub struct MockServer {
    pub addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    pub async fn start() -> Self {
        Self::with_behaviour(Behaviour::default()).await
    }

    pub async fn with_behaviour(behaviour: Behaviour) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(ServerState::default()));
        let behaviour = Arc::new(behaviour);

        let shared = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                shared.lock().unwrap().connections += 1;
                tokio::spawn(serve(stream, Arc::clone(&shared), Arc::clone(&behaviour)));
            }
        });

        Self { addr, state }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.addr.port())
    }

    pub fn put_file(&self, name: &str, contents: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(name.to_string(), contents.to_vec());
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(name).cloned()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Number of received commands using `verb`.
    pub fn count(&self, verb: &str) -> usize {
        self.commands()
            .iter()
            .filter(|line| line.split(' ').next() == Some(verb))
            .count()
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }
}

async fn reply(writer: &mut OwnedWriteHalf, text: &str) -> std::io::Result<()> {
    writer.write_all(format!("{text}\r\n").as_bytes()).await
}

fn listing(state: &Mutex<ServerState>) -> String {
    state
        .lock()
        .unwrap()
        .files
        .iter()
        .map(|(name, contents)| {
            format!(
                "-rw-r--r--    1 ftp      ftp      {:>8} Jan 01  2024 {}",
                contents.len(),
                name
            )
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

async fn accept_data(passive: &mut Option<TcpListener>) -> Option<TcpStream> {
    let listener = passive.take()?;
    listener.accept().await.ok().map(|(stream, _)| stream)
}

async fn serve(stream: TcpStream, state: Arc<Mutex<ServerState>>, behaviour: Arc<Behaviour>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    if reply(&mut writer, "220 mock FTP server ready").await.is_err() {
        return;
    }

    let mut passive: Option<TcpListener> = None;
    let mut rename_from: Option<String> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        state.lock().unwrap().commands.push(line.clone());
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
            None => (line.to_ascii_uppercase(), String::new()),
        };

        if behaviour.hang_up_on.as_deref() == Some(verb.as_str()) {
            break;
        }

        let response = match verb.as_str() {
            "USER" => {
                tokio::time::sleep(behaviour.login_delay).await;
                "331 Please specify the password".to_string()
            }
            "PASS" if arg == behaviour.password && behaviour.require_account => {
                "332 Need account for login".to_string()
            }
            "PASS" if arg == behaviour.password => "230 Login successful".to_string(),
            "PASS" => "530 Login incorrect".to_string(),
            "ACCT" => "230 Account accepted".to_string(),
            "FEAT" => "211-Features:\r\n MDTM\r\n SIZE\r\n UTF8\r\n211 End".to_string(),
            "SYST" => format!("215 {}", behaviour.system),
            "TYPE" => format!("200 Switching to type {arg}"),
            "NOOP" => "200 NOOP ok".to_string(),
            "PWD" => "257 \"/\" is the current directory".to_string(),
            "CWD" | "RMD" | "SITE" => "250 Requested action okay".to_string(),
            "MKD" => format!("257 \"{arg}\" created"),
            "DELE" => {
                let removed = state.lock().unwrap().files.remove(&arg).is_some();
                if removed {
                    "250 Delete operation successful".to_string()
                } else {
                    "550 Delete operation failed".to_string()
                }
            }
            "RNFR" => {
                let exists = state.lock().unwrap().files.contains_key(&arg);
                if exists {
                    rename_from = Some(arg);
                    "350 Ready for RNTO".to_string()
                } else {
                    "550 RNFR command failed".to_string()
                }
            }
            "RNTO" => match rename_from.take() {
                Some(from) => {
                    let mut state = state.lock().unwrap();
                    if let Some(contents) = state.files.remove(&from) {
                        state.files.insert(arg, contents);
                    }
                    "250 Rename successful".to_string()
                }
                None => "503 RNFR required first".to_string(),
            },
            "STAT" if behaviour.stat_supported => {
                format!("213-Status of {arg}:\r\n{}\r\n213 End of status", listing(&state))
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                passive = Some(listener);
                behaviour.pasv_reply.clone().unwrap_or_else(|| {
                    format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{})",
                        port / 256,
                        port % 256
                    )
                })
            }
            "LIST" => match accept_data(&mut passive).await {
                Some(mut data) => {
                    let _ = reply(&mut writer, "150 Here comes the directory listing").await;
                    let body = listing(&state);
                    let _ = data.write_all(format!("{body}\r\n").as_bytes()).await;
                    drop(data);
                    "226 Directory send OK".to_string()
                }
                None => "425 Use PASV first".to_string(),
            },
            "RETR" => {
                let contents = state.lock().unwrap().files.get(&arg).cloned();
                match contents {
                    Some(contents) => match accept_data(&mut passive).await {
                        Some(mut data) => {
                            let _ = reply(&mut writer, "150 Opening BINARY mode data connection")
                                .await;
                            let _ = data.write_all(&contents).await;
                            drop(data);
                            "226 Transfer complete".to_string()
                        }
                        None => "425 Use PASV first".to_string(),
                    },
                    None => {
                        passive = None;
                        "550 Failed to open file".to_string()
                    }
                }
            }
            "STOR" => match accept_data(&mut passive).await {
                Some(mut data) => {
                    let _ = reply(&mut writer, "150 Ok to send data").await;
                    let mut contents = Vec::new();
                    let _ = data.read_to_end(&mut contents).await;
                    state.lock().unwrap().files.insert(arg, contents);
                    "226 Transfer complete".to_string()
                }
                None => "425 Use PASV first".to_string(),
            },
            "QUIT" => {
                let _ = reply(&mut writer, "221 Goodbye").await;
                break;
            }
            _ => "502 Command not implemented".to_string(),
        };

        if reply(&mut writer, &response).await.is_err() {
            break;
        }
    }
}
