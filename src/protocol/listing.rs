//! Directory listing parser
//!
//! Turns raw `LIST`/`STAT` output into [`FileEntry`] records. Supports
//! Unix `ls -l` lines and MS-DOS/IIS lines; anything else (reply headers,
//! `total` lines, blank lines) is skipped.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    SymbolicLink,
    Unknown,
}

/// Read/write/execute triple for one permission class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

impl Permissions {
    fn from_triple(triple: &[u8]) -> Self {
        Self {
            read: triple[0] == b'r',
            write: triple[1] == b'w',
            exec: matches!(triple[2], b'x' | b's' | b't'),
        }
    }
}

/// A single entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub entry_type: EntryType,
    pub time: Option<NaiveDateTime>,
    pub size: u64,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub user_permissions: Permissions,
    pub group_permissions: Permissions,
    pub other_permissions: Permissions,
    pub target: Option<String>,
}

/// Parses raw listing text into entries.
pub trait ListingDecoder: Send + Sync {
    fn parse_entries(&self, raw: &str) -> Vec<FileEntry>;
}

static UNIX_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^([dlcbps-])([rwxsStT-]{9})\S*\s+   # type and permissions
        \d+\s+                              # link count
        (\S+)\s+                            # owner
        (\S+)\s+                            # group
        (\d+)\s+                            # size
        (\w{3})\s+(\d{1,2})\s+(\d{1,2}:\d{2}|\d{4})\s+   # month day time-or-year
        (.+)$                               # name
        ",
    )
    .expect("unix listing pattern")
});

static DOS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})-(\d{2})-(\d{2,4})\s+(\d{1,2}):(\d{2})\s*([AaPp][Mm])\s+(<DIR>|\d+)\s+(.+)$")
        .expect("dos listing pattern")
});

/// Listing decoder for Unix and MS-DOS style servers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixListingParser;

impl ListingDecoder for UnixListingParser {
    fn parse_entries(&self, raw: &str) -> Vec<FileEntry> {
        raw.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter_map(parse_line)
            .filter(|e| e.name != "." && e.name != "..")
            .collect()
    }
}

/// Parses one listing line.
pub fn parse_line(line: &str) -> Option<FileEntry> {
    parse_unix(line).or_else(|| parse_dos(line))
}

fn parse_unix(line: &str) -> Option<FileEntry> {
    let caps = UNIX_LINE.captures(line)?;

    let entry_type = match &caps[1] {
        "d" => EntryType::Directory,
        "l" => EntryType::SymbolicLink,
        "-" => EntryType::File,
        _ => EntryType::Unknown,
    };
    let perms = caps[2].as_bytes();
    let size = caps[5].parse::<u64>().ok()?;
    let time = parse_unix_time(&caps[6], &caps[7], &caps[8]);

    let raw_name = &caps[9];
    let (name, target) = match (entry_type, raw_name.split_once(" -> ")) {
        (EntryType::SymbolicLink, Some((name, target))) => {
            (name.to_string(), Some(target.to_string()))
        }
        _ => (raw_name.to_string(), None),
    };

    Some(FileEntry {
        name,
        entry_type,
        time,
        size,
        owner: Some(caps[3].to_string()),
        group: Some(caps[4].to_string()),
        user_permissions: Permissions::from_triple(&perms[0..3]),
        group_permissions: Permissions::from_triple(&perms[3..6]),
        other_permissions: Permissions::from_triple(&perms[6..9]),
        target,
    })
}

fn parse_unix_time(month: &str, day: &str, time_or_year: &str) -> Option<NaiveDateTime> {
    let month = month_number(month)?;
    let day = day.parse::<u32>().ok()?;
    if let Some((hour, minute)) = time_or_year.split_once(':') {
        // Recent entries omit the year.
        let year = Utc::now().year();
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)?;
        Some(date.and_time(time))
    } else {
        let year = time_or_year.parse::<i32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
    }
}

fn month_number(month: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let month = month.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == month)
        .map(|i| i as u32 + 1)
}

fn parse_dos(line: &str) -> Option<FileEntry> {
    let caps = DOS_LINE.captures(line)?;

    let month = caps[1].parse::<u32>().ok()?;
    let day = caps[2].parse::<u32>().ok()?;
    let mut year = caps[3].parse::<i32>().ok()?;
    if year < 100 {
        year += if year < 70 { 2000 } else { 1900 };
    }
    let mut hour = caps[4].parse::<u32>().ok()? % 12;
    if caps[6].eq_ignore_ascii_case("pm") {
        hour += 12;
    }
    let minute = caps[5].parse::<u32>().ok()?;
    let time = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0));

    let (entry_type, size) = match &caps[7] {
        "<DIR>" => (EntryType::Directory, 0),
        size => (EntryType::File, size.parse::<u64>().ok()?),
    };

    Some(FileEntry {
        name: caps[8].to_string(),
        entry_type,
        time,
        size,
        owner: None,
        group: None,
        user_permissions: Permissions::default(),
        group_permissions: Permissions::default(),
        other_permissions: Permissions::default(),
        target: None,
    })
}
