use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nu_ansi_term::Color;
use probing_monitor::ProfileKind;

pub mod commands;
pub mod sentinel;

use commands::Commands;
use sentinel::Sentinel;

/// Send debug commands to a process running the probing monitor
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Working directory of the target process
    #[arg(
        short = 'C',
        long,
        global = true,
        default_value = ".",
        env = "PROBING_MONITOR_DIR"
    )]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run(&self) -> Result<()> {
        let sentinel = Sentinel::new(&self.dir);
        match &self.command {
            Commands::Send { words, wait } => {
                let cmd = words.join(" ");
                sentinel.send(&cmd)?;
                if let Some(secs) = wait {
                    if !sentinel.wait_consumed(Duration::from_secs(*secs)) {
                        anyhow::bail!("command '{}' not consumed after {}s", cmd, secs);
                    }
                    println!("{} '{}'", Color::Green.bold().paint("consumed"), cmd);
                }
                Ok(())
            }
            Commands::Lookup {
                profile,
                wait,
                print,
            } => {
                let path = sentinel.lookup(*profile, Duration::from_secs(*wait))?;
                if *print {
                    let content = fs::read_to_string(&path)
                        .with_context(|| format!("couldn't read {}", path.display()))?;
                    print!("{}", content);
                } else {
                    println!("{} {}", Color::Green.bold().paint("dumped"), path.display());
                }
                Ok(())
            }
            Commands::Status => {
                match sentinel.pending() {
                    Some(cmd) => println!("pending: '{}'", Color::Yellow.paint(cmd)),
                    None => println!("pending: none"),
                }
                for kind in ProfileKind::ALL {
                    let path = sentinel.artifact_path(kind);
                    match sentinel.artifact(kind) {
                        Some(meta) => {
                            println!("{:<12} {} ({} bytes)", kind, path.display(), meta.len())
                        }
                        None => println!("{:<12} {}", kind, Color::DarkGray.paint("missing")),
                    }
                }
                Ok(())
            }
            Commands::Clear => {
                if sentinel.clear()? {
                    println!("pending command dropped");
                }
                Ok(())
            }
        }
    }
}
