//! Command-line interface for speechrelay
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stream microphone audio to Google Speech-to-Text
#[derive(Parser, Debug)]
#[command(
    name = "speechrelay",
    version,
    about = "Stream microphone audio to Google Speech-to-Text"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// OAuth2 access token (overrides config and SPEECHRELAY_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// BCP-47 language code, e.g. en-US, de-DE
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Audio input device (see `speechrelay devices`)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Chunk duration in seconds; one recognition request per chunk
    #[arg(long, short = 'c', value_name = "SECONDS")]
    pub chunk_size: Option<u32>,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(long, short = 'd', value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Show a live sound level meter on stderr
    #[arg(long, short = 'm')]
    pub meter: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_args() {
        let cli = Cli::parse_from(["speechrelay"]);
        assert!(cli.command.is_none());
        assert!(cli.token.is_none());
        assert!(!cli.meter);
    }

    #[test]
    fn test_parse_listen_options() {
        let cli = Cli::parse_from([
            "speechrelay",
            "--language",
            "de-DE",
            "-c",
            "5",
            "-d",
            "30",
            "--meter",
        ]);
        assert_eq!(cli.language.as_deref(), Some("de-DE"));
        assert_eq!(cli.chunk_size, Some(5));
        assert_eq!(cli.duration, Some(30));
        assert!(cli.meter);
    }

    #[test]
    fn test_parse_devices_subcommand() {
        let cli = Cli::parse_from(["speechrelay", "devices"]);
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }
}
