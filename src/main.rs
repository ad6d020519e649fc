//! RAX FTP Client - Entry Point
//!
//! Interactive shell on top of the client library. Connection settings come
//! from `config.toml` and `RAX_FTP_CLIENT_*` environment variables.

use std::io::Write;
use std::process::ExitCode;

use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

use rax_ftp_client::shell::{self, ShellCommand};
use rax_ftp_client::{ClientConfig, FtpClient};

fn prompt() {
    print!("ftp> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let config = match ClientConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Connecting to {}:{}...", config.host, config.port);
    let client = FtpClient::new(config);
    if let Err(e) = client.auth().await {
        error!("Login failed: {}", e);
        return ExitCode::FAILURE;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = shell::parse_command(&line);
        if command == ShellCommand::Quit {
            break;
        }
        match shell::execute(&client, command).await {
            Ok(output) if output.is_empty() => {}
            Ok(output) => println!("{output}"),
            Err(e) => println!("error: {e}"),
        }
        prompt();
    }

    if let Err(e) = client.quit().await {
        error!("QUIT failed: {}", e);
    }
    ExitCode::SUCCESS
}
