use std::fmt::Display;

use probing_pprof::{GOROUTINE, HEAP, THREADCREATE};

/// Characters stripped from both ends of a raw command.
const COMMAND_PADDING: [char; 4] = [' ', '\t', '\n', '\r'];

/// Built-in profiles a command can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKind {
    Goroutine,
    Heap,
    ThreadCreate,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 3] = [
        ProfileKind::Goroutine,
        ProfileKind::Heap,
        ProfileKind::ThreadCreate,
    ];

    /// Command text that requests this profile.
    pub fn command(self) -> &'static str {
        match self {
            ProfileKind::Goroutine => "lookup goroutine",
            ProfileKind::Heap => "lookup heap",
            ProfileKind::ThreadCreate => "lookup threadcreate",
        }
    }

    /// Name of the profile in the `probing_pprof` registry.
    pub fn profile_name(self) -> &'static str {
        match self {
            ProfileKind::Goroutine => GOROUTINE,
            ProfileKind::Heap => HEAP,
            ProfileKind::ThreadCreate => THREADCREATE,
        }
    }

    /// File name the profile is dumped to.
    pub fn artifact(self) -> &'static str {
        match self {
            ProfileKind::Goroutine => "unittest.goroutine",
            ProfileKind::Heap => "unittest.heap",
            ProfileKind::ThreadCreate => "unittest.thread",
        }
    }

    pub fn from_profile_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.profile_name() == name)
    }
}

impl Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.profile_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lookup(ProfileKind),
    Other(String),
}

impl Command {
    /// Parses raw sentinel content. Returns `None` when nothing but padding
    /// is left after trimming.
    pub fn parse(raw: &str) -> Option<Command> {
        let cmd = trim_command(raw);
        if cmd.is_empty() {
            return None;
        }
        let command = ProfileKind::ALL
            .into_iter()
            .find(|k| k.command() == cmd)
            .map(Command::Lookup)
            .unwrap_or_else(|| Command::Other(cmd.to_string()));
        Some(command)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::Lookup(kind) => kind.command(),
            Command::Other(cmd) => cmd,
        }
    }
}

pub fn trim_command(raw: &str) -> &str {
    raw.trim_matches(&COMMAND_PADDING[..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lookup_commands() {
        assert_eq!(
            Command::parse("lookup goroutine"),
            Some(Command::Lookup(ProfileKind::Goroutine))
        );
        assert_eq!(
            Command::parse("lookup heap"),
            Some(Command::Lookup(ProfileKind::Heap))
        );
        assert_eq!(
            Command::parse("lookup threadcreate"),
            Some(Command::Lookup(ProfileKind::ThreadCreate))
        );
    }

    #[test]
    fn test_parse_trims_padding() {
        assert_eq!(
            Command::parse("  lookup heap\n"),
            Some(Command::Lookup(ProfileKind::Heap))
        );
        assert_eq!(
            Command::parse("\t\r\nrestart-server \r\n"),
            Some(Command::Other("restart-server".to_string()))
        );
        assert_eq!(Command::parse(" \t\r\n"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_parse_is_exact_match() {
        assert_eq!(
            Command::parse("lookup  heap"),
            Some(Command::Other("lookup  heap".to_string()))
        );
        assert_eq!(
            Command::parse("LOOKUP HEAP"),
            Some(Command::Other("LOOKUP HEAP".to_string()))
        );
        assert_eq!(
            Command::parse("lookup thread"),
            Some(Command::Other("lookup thread".to_string()))
        );
    }

    #[test]
    fn test_only_listed_padding_is_trimmed() {
        // vertical tab and no-break space are part of the command
        assert_eq!(trim_command("\u{0b}cmd\u{a0}"), "\u{0b}cmd\u{a0}");
    }

    #[test]
    fn test_profile_kind_names() {
        assert_eq!(ProfileKind::ThreadCreate.profile_name(), "threadcreate");
        assert_eq!(ProfileKind::ThreadCreate.artifact(), "unittest.thread");
        assert_eq!(
            ProfileKind::from_profile_name("heap"),
            Some(ProfileKind::Heap)
        );
        assert_eq!(ProfileKind::from_profile_name("thread"), None);
        assert_eq!(ProfileKind::Goroutine.to_string(), "goroutine");
    }
}
