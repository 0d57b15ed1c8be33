//! CLI command definitions and subcommands

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Eventline - live guest lists and day timelines for events
#[derive(Parser)]
#[command(
    name = "el",
    about = "Live guest lists and day timelines for events",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render the composed timeline for one event day
    Timeline {
        /// Day to view (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Fixed now for status classification (YYYY-MM-DDTHH:MM:SS);
        /// defaults to the wall clock
        #[arg(long)]
        at: Option<NaiveDateTime>,

        /// Serve data from a fixture file instead of a live backend
        #[arg(short, long)]
        fixture: Option<PathBuf>,

        /// Company id (overrides config)
        #[arg(long)]
        company: Option<String>,

        /// Event id (overrides config)
        #[arg(long)]
        event: Option<String>,

        /// Keep running and re-render as data and the clock move
        #[arg(short, long)]
        watch: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the live guest list
    Guests {
        /// Serve data from a fixture file instead of a live backend
        #[arg(short, long)]
        fixture: Option<PathBuf>,

        /// Company id (overrides config)
        #[arg(long)]
        company: Option<String>,

        /// Event id (overrides config)
        #[arg(long)]
        event: Option<String>,

        /// Keep running and re-render as guests change
        #[arg(short, long)]
        watch: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for rendering commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {} (expected text or json)", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeline_with_date_and_at() {
        let cli = Cli::parse_from([
            "el",
            "timeline",
            "--date",
            "2024-05-01",
            "--at",
            "2024-05-01T09:30:00",
        ]);
        match cli.command {
            Command::Timeline { date, at, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1));
                assert_eq!(
                    at.map(|t| t.to_string()),
                    Some("2024-05-01 09:30:00".to_string())
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_guests_defaults() {
        let cli = Cli::parse_from(["el", "guests"]);
        match cli.command {
            Command::Guests { watch, format, .. } => {
                assert!(!watch);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("TEXT".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
