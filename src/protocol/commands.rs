//! Module `commands`
//!
//! Enumerates the FTP verbs the client knows how to send and formats
//! them, together with their arguments, into command lines.

use std::fmt;
use std::str::FromStr;

/// An FTP verb understood by the client.
///
/// Every verb maps to exactly one wire keyword; arguments are supplied
/// separately when the command line is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    // Commands without parameters
    Abor,
    Pwd,
    Cdup,
    Feat,
    Noop,
    Quit,
    Pasv,
    Syst,
    // Commands with one or more parameters
    Acct,
    Cwd,
    Dele,
    List,
    Mdtm,
    Mkd,
    Mode,
    Nlst,
    Retr,
    Rmd,
    Rnfr,
    Rnto,
    Site,
    Stat,
    Stor,
    Type,
    User,
    Pass,
    Xrmd,
    Opts,
    // Extended features
    Size,
}

impl Verb {
    pub const ALL: [Verb; 29] = [
        Verb::Abor,
        Verb::Pwd,
        Verb::Cdup,
        Verb::Feat,
        Verb::Noop,
        Verb::Quit,
        Verb::Pasv,
        Verb::Syst,
        Verb::Acct,
        Verb::Cwd,
        Verb::Dele,
        Verb::List,
        Verb::Mdtm,
        Verb::Mkd,
        Verb::Mode,
        Verb::Nlst,
        Verb::Retr,
        Verb::Rmd,
        Verb::Rnfr,
        Verb::Rnto,
        Verb::Site,
        Verb::Stat,
        Verb::Stor,
        Verb::Type,
        Verb::User,
        Verb::Pass,
        Verb::Xrmd,
        Verb::Opts,
        Verb::Size,
    ];

    /// Wire keyword for this verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Abor => "ABOR",
            Verb::Pwd => "PWD",
            Verb::Cdup => "CDUP",
            Verb::Feat => "FEAT",
            Verb::Noop => "NOOP",
            Verb::Quit => "QUIT",
            Verb::Pasv => "PASV",
            Verb::Syst => "SYST",
            Verb::Acct => "ACCT",
            Verb::Cwd => "CWD",
            Verb::Dele => "DELE",
            Verb::List => "LIST",
            Verb::Mdtm => "MDTM",
            Verb::Mkd => "MKD",
            Verb::Mode => "MODE",
            Verb::Nlst => "NLST",
            Verb::Retr => "RETR",
            Verb::Rmd => "RMD",
            Verb::Rnfr => "RNFR",
            Verb::Rnto => "RNTO",
            Verb::Site => "SITE",
            Verb::Stat => "STAT",
            Verb::Stor => "STOR",
            Verb::Type => "TYPE",
            Verb::User => "USER",
            Verb::Pass => "PASS",
            Verb::Xrmd => "XRMD",
            Verb::Opts => "OPTS",
            Verb::Size => "SIZE",
        }
    }

    /// Verbs that may run before authentication has completed.
    pub fn is_bootstrap(&self) -> bool {
        matches!(self, Verb::Feat | Verb::Syst | Verb::User | Verb::Pass)
    }

    /// Verbs whose reply only makes sense alongside an open data channel.
    pub fn needs_data_channel(&self) -> bool {
        matches!(self, Verb::List | Verb::Nlst | Verb::Retr | Verb::Stor)
    }

    /// Builds the command line for this verb and its arguments.
    ///
    /// Empty arguments are dropped, so `LIST ""` is sent as plain `LIST`.
    pub fn line(&self, args: &[&str]) -> String {
        let mut line = self.as_str().to_string();
        for arg in args.iter().filter(|a| !a.is_empty()) {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a keyword does not name a known verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVerb(pub String);

impl fmt::Display for UnknownVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown raw command: {}", self.0)
    }
}

impl std::error::Error for UnknownVerb {}

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keyword = s.trim().to_ascii_uppercase();
        Verb::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == keyword)
            .ok_or_else(|| UnknownVerb(s.trim().to_string()))
    }
}

/// Masks secrets before a command line reaches the logs.
pub(crate) fn loggable(line: &str) -> &str {
    if line.len() >= 4 && line[..4].eq_ignore_ascii_case("PASS") {
        "PASS ****"
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_lines_and_drops_empty_arguments() {
        assert_eq!(Verb::List.line(&[""]), "LIST");
        assert_eq!(Verb::Rnfr.line(&["a.txt"]), "RNFR a.txt");
        assert_eq!(Verb::Site.line(&["CHMOD", "644", "a.txt"]), "SITE CHMOD 644 a.txt");
    }

    #[test]
    fn parses_keywords_case_insensitively() {
        assert_eq!("pwd".parse::<Verb>(), Ok(Verb::Pwd));
        assert_eq!(" Mkd ".parse::<Verb>(), Ok(Verb::Mkd));
        assert_eq!("bogus".parse::<Verb>(), Err(UnknownVerb("bogus".into())));
    }

    #[test]
    fn only_login_and_discovery_verbs_are_bootstrap() {
        let bootstrap: Vec<Verb> = Verb::ALL.iter().copied().filter(Verb::is_bootstrap).collect();
        assert_eq!(bootstrap, vec![Verb::Feat, Verb::Syst, Verb::User, Verb::Pass]);
    }

    #[test]
    fn transfer_verbs_need_a_data_channel() {
        let data: Vec<Verb> = Verb::ALL
            .iter()
            .copied()
            .filter(Verb::needs_data_channel)
            .collect();
        assert_eq!(data.len(), 4);
        assert!(data.contains(&Verb::Nlst));
        assert!(!Verb::Pasv.needs_data_channel());
    }

    #[test]
    fn masks_passwords() {
        assert_eq!(loggable("PASS secret"), "PASS ****");
        assert_eq!(loggable("USER bob"), "USER bob");
    }
}
