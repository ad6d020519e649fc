//! Interactive shell commands
//!
//! Parses lines typed at the `rax-ftp-client` prompt and runs them against
//! an [`FtpClient`].

use std::path::{Path, PathBuf};

use crate::client::FtpClient;
use crate::error::FtpResult;
use crate::protocol::{EntryType, FileEntry, Verb};

#[derive(Debug, PartialEq)]
pub enum ShellCommand {
    Quit,
    Help,
    Features,
    KeepAlive,
    Ls(String),
    List(String),
    Pwd,
    Cd(String),
    Mkdir(String),
    Rmdir(String),
    Delete(String),
    Rename(String, String),
    Chmod(String, String),
    Get(String, Option<PathBuf>),
    Put(PathBuf, Option<String>),
    Raw(Verb, Vec<String>),
    Empty,
    Unknown(String),
}

pub const HELP: &str = "\
commands:
  ls [path]              parsed directory listing
  list [path]            raw LIST output
  pwd | cd <path>
  mkdir <path> | rmdir <path> | rm <path>
  mv <from> <to>
  chmod <mode> <path>
  get <remote> [local]
  put <local> [remote]
  feat                   server features
  keepalive              send NOOP periodically
  raw <VERB> [args..]    send any supported verb
  quit";

// Parse a shell line into a ShellCommand
pub fn parse_command(raw: &str) -> ShellCommand {
    let trimmed = raw.trim();
    let mut parts = trimmed.split_whitespace();
    let Some(cmd) = parts.next() else {
        return ShellCommand::Empty;
    };
    let args: Vec<String> = parts.map(str::to_string).collect();
    let arg = |i: usize| args.get(i).cloned();
    let path_or_cwd = || arg(0).unwrap_or_default();

    match (cmd.to_ascii_lowercase().as_str(), args.len()) {
        ("quit" | "exit" | "q", _) => ShellCommand::Quit,
        ("help" | "?", _) => ShellCommand::Help,
        ("feat", _) => ShellCommand::Features,
        ("keepalive", 0) => ShellCommand::KeepAlive,
        ("ls", _) => ShellCommand::Ls(path_or_cwd()),
        ("list", _) => ShellCommand::List(path_or_cwd()),
        ("pwd", _) => ShellCommand::Pwd,
        ("cd", 1) => ShellCommand::Cd(args[0].clone()),
        ("mkdir", 1) => ShellCommand::Mkdir(args[0].clone()),
        ("rmdir", 1) => ShellCommand::Rmdir(args[0].clone()),
        ("rm" | "delete", 1) => ShellCommand::Delete(args[0].clone()),
        ("mv" | "rename", 2) => ShellCommand::Rename(args[0].clone(), args[1].clone()),
        ("chmod", 2) => ShellCommand::Chmod(args[0].clone(), args[1].clone()),
        ("get", 1 | 2) => ShellCommand::Get(args[0].clone(), arg(1).map(PathBuf::from)),
        ("put", 1 | 2) => ShellCommand::Put(PathBuf::from(&args[0]), arg(1)),
        ("raw", n) if n >= 1 => match args[0].parse::<Verb>() {
            Ok(verb) => ShellCommand::Raw(verb, args[1..].to_vec()),
            Err(_) => ShellCommand::Unknown(trimmed.to_string()),
        },
        _ => ShellCommand::Unknown(trimmed.to_string()),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn format_entry(entry: &FileEntry) -> String {
    let kind = match entry.entry_type {
        EntryType::Directory => 'd',
        EntryType::SymbolicLink => 'l',
        EntryType::File => '-',
        EntryType::Unknown => '?',
    };
    let time = entry
        .time
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    match &entry.target {
        Some(target) => format!("{kind} {:>12} {:16} {} -> {}", entry.size, time, entry.name, target),
        None => format!("{kind} {:>12} {:16} {}", entry.size, time, entry.name),
    }
}

/// Runs one command and returns the text to print.
pub async fn execute(client: &FtpClient, command: ShellCommand) -> FtpResult<String> {
    let output = match command {
        ShellCommand::Quit | ShellCommand::Empty => String::new(),
        ShellCommand::Help => HELP.to_string(),
        ShellCommand::Unknown(line) => format!("unknown command: {line} (try `help`)"),
        ShellCommand::Features => {
            let mut features: Vec<String> = client.ensure_features().await.into_iter().collect();
            features.sort();
            features.join("\n")
        }
        ShellCommand::KeepAlive => {
            client.keep_alive().await;
            format!(
                "keepalive every {}s",
                client.config().keepalive_interval_secs
            )
        }
        ShellCommand::Ls(path) => client
            .ls(&path)
            .await?
            .iter()
            .map(format_entry)
            .collect::<Vec<_>>()
            .join("\n"),
        ShellCommand::List(path) => client.list(&path).await?,
        ShellCommand::Pwd => client.pwd().await?.text,
        ShellCommand::Cd(path) => client.cwd(&path).await?.text,
        ShellCommand::Mkdir(path) => client.mkd(&path).await?.text,
        ShellCommand::Rmdir(path) => client.rmd(&path).await?.text,
        ShellCommand::Delete(path) => client.dele(&path).await?.text,
        ShellCommand::Rename(from, to) => client.rename(&from, &to).await?.text,
        ShellCommand::Chmod(mode, path) => client.chmod(&mode, &path).await?.text,
        ShellCommand::Get(remote, local) => {
            let local = local.unwrap_or_else(|| PathBuf::from(file_name(Path::new(&remote))));
            let bytes = client.get_to_file(&remote, &local).await?;
            format!("{} bytes written to {}", bytes, local.display())
        }
        ShellCommand::Put(local, remote) => {
            let remote = remote.unwrap_or_else(|| file_name(&local));
            client.put(local, &remote).await?.text
        }
        ShellCommand::Raw(verb, args) => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            client.raw(verb, &args).await?.text
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(parse_command("QUIT"), ShellCommand::Quit);
        assert_eq!(parse_command("q"), ShellCommand::Quit);
        assert_eq!(parse_command("pwd"), ShellCommand::Pwd);
        assert_eq!(parse_command("keepalive"), ShellCommand::KeepAlive);
        assert_eq!(parse_command("ls"), ShellCommand::Ls(String::new()));
        assert_eq!(parse_command("   "), ShellCommand::Empty);
    }

    #[test]
    fn test_parse_commands_with_args() {
        assert_eq!(parse_command("cd /pub"), ShellCommand::Cd("/pub".into()));
        assert_eq!(
            parse_command("mv a.txt b.txt"),
            ShellCommand::Rename("a.txt".into(), "b.txt".into())
        );
        assert_eq!(
            parse_command("get /pub/readme.txt"),
            ShellCommand::Get("/pub/readme.txt".into(), None)
        );
        assert_eq!(
            parse_command("put ./notes.md docs/notes.md"),
            ShellCommand::Put(PathBuf::from("./notes.md"), Some("docs/notes.md".into()))
        );
    }

    #[test]
    fn test_parse_raw_verbs() {
        assert_eq!(
            parse_command("raw mdtm a.txt"),
            ShellCommand::Raw(Verb::Mdtm, vec!["a.txt".into()])
        );
        assert!(matches!(parse_command("raw frob"), ShellCommand::Unknown(_)));
    }

    #[test]
    fn test_wrong_arity_is_unknown() {
        assert!(matches!(parse_command("cd"), ShellCommand::Unknown(_)));
        assert!(matches!(parse_command("mv only-one"), ShellCommand::Unknown(_)));
    }

    #[test]
    fn test_file_name_of_remote_path() {
        assert_eq!(file_name(Path::new("/pub/readme.txt")), "readme.txt");
        assert_eq!(file_name(Path::new("plain")), "plain");
    }
}
