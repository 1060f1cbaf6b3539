//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use batlens_report::ExportFormat;

#[derive(Parser, Debug)]
#[command(name = "batlens")]
#[command(about = "Trim a video, submit it for bat detection and export the results")]
#[command(version)]
pub struct Cli {
    /// Session file carrying state between invocations
    #[arg(long, global = true, env = "BATLENS_SESSION_FILE", default_value = ".batlens-session.json")]
    pub session: PathBuf,

    /// Detection service base URL
    #[arg(long, global = true, env = "DETECTOR_SERVICE_URL")]
    pub service_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Select a video and reset the segment to its full length
    SelectFile { path: PathBuf },

    /// Trim the selected video (seconds)
    SetSegment {
        #[arg(allow_negative_numbers = true)]
        start: f64,
        #[arg(allow_negative_numbers = true)]
        end: f64,
    },

    /// Set detection sensitivity (0.1 - 1.0)
    SetSensitivity { value: f64 },

    /// Submit the current segment for analysis
    Analyze {
        /// Substitute simulated results if the service fails
        #[arg(long, conflicts_with = "no_fallback")]
        fallback: bool,

        /// Report service failures instead of simulating results
        #[arg(long)]
        no_fallback: bool,
    },

    /// Export the latest result
    Export {
        #[arg(value_enum)]
        format: FormatArg,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Probe the detection service
    Health,

    /// Show the current session
    Status,
}

impl Command {
    /// `Some(enabled)` when the flags override the configured fallback mode.
    pub fn fallback_override(&self) -> Option<bool> {
        match self {
            Command::Analyze { fallback: true, .. } => Some(true),
            Command::Analyze { no_fallback: true, .. } => Some(false),
            _ => None,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Csv,
    Json,
    Png,
    Pdf,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Png => ExportFormat::Png,
            FormatArg::Pdf => ExportFormat::Pdf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_segment() {
        let cli = Cli::try_parse_from(["batlens", "--session", "s.json", "set-segment", "5", "45.5"]).unwrap();
        assert_eq!(cli.session, PathBuf::from("s.json"));
        assert!(matches!(cli.command, Command::SetSegment { start, end } if start == 5.0 && end == 45.5));
    }

    #[test]
    fn test_fallback_flags() {
        let cli = Cli::try_parse_from(["batlens", "analyze", "--no-fallback"]).unwrap();
        assert_eq!(cli.command.fallback_override(), Some(false));

        let cli = Cli::try_parse_from(["batlens", "analyze"]).unwrap();
        assert_eq!(cli.command.fallback_override(), None);

        assert!(Cli::try_parse_from(["batlens", "analyze", "--fallback", "--no-fallback"]).is_err());
    }

    #[test]
    fn test_export_format() {
        let cli = Cli::try_parse_from(["batlens", "export", "png", "--out", "/tmp/x"]).unwrap();
        match cli.command {
            Command::Export { format, out } => {
                assert_eq!(ExportFormat::from(format), ExportFormat::Png);
                assert_eq!(out, PathBuf::from("/tmp/x"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
