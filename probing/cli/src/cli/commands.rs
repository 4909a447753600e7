use clap::Subcommand;
use probing_monitor::ProfileKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a raw command into the sentinel of the target process
    #[command()]
    Send {
        /// Command words, joined with single spaces
        #[arg(required = true)]
        words: Vec<String>,

        /// Seconds to wait for the monitor to consume the command
        #[arg(short, long)]
        wait: Option<u64>,
    },

    /// Ask the target process to dump one of its profiles
    #[command(visible_aliases = ["l"])]
    Lookup {
        /// Profile to dump: goroutine, heap or threadcreate
        #[arg(value_parser = parse_profile_kind)]
        profile: ProfileKind,

        /// Seconds to wait for the dump
        #[arg(short, long, default_value_t = 5)]
        wait: u64,

        /// Print the dump once it is written
        #[arg(short, long)]
        print: bool,
    },

    /// Show the pending command and the existing dumps
    #[command()]
    Status,

    /// Drop a pending command
    #[command()]
    Clear,
}

fn parse_profile_kind(name: &str) -> Result<ProfileKind, String> {
    ProfileKind::from_profile_name(name).ok_or_else(|| {
        let names: Vec<&str> = ProfileKind::ALL.iter().map(|k| k.profile_name()).collect();
        format!("unknown profile '{}', expected one of: {}", name, names.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_kind() {
        assert_eq!(parse_profile_kind("threadcreate"), Ok(ProfileKind::ThreadCreate));
        let err = parse_profile_kind("block").unwrap_err();
        assert!(err.contains("goroutine, heap, threadcreate"));
    }
}
