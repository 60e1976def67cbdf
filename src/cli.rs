//! Command-line interface definitions for NearDupe.
//!
//! Global options (verbosity, color, config file, error format) apply to every
//! subcommand. Threshold flags are optional so that unset flags fall back to
//! the config file and environment.
//!
//! # Example
//!
//! ```bash
//! # Run a grouping pass over the default database
//! neardupe group
//!
//! # Only PDFs, with a stricter visual threshold
//! neardupe group --kind pdf --visual-threshold 4
//!
//! # Second page of stored groups as JSON
//! neardupe groups --page 2 --output json
//!
//! # Inspect the fingerprints of one file
//! neardupe fingerprint scan.png
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Near-duplicate detection and grouping for documents and images.
///
/// NearDupe groups files that are the same content in different encodings,
/// scans, resolutions or excerpts, and records why each member was grouped.
#[derive(Debug, Parser)]
#[command(name = "neardupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Path to a TOML configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a grouping pass over a fingerprint database
    Group(GroupArgs),
    /// List stored groups
    Groups(GroupsArgs),
    /// Print fingerprints of a local file
    Fingerprint(FingerprintArgs),
}

/// Arguments for the group subcommand.
#[derive(Debug, Args)]
pub struct GroupArgs {
    /// SQLite database holding documents and page fingerprints
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Maximum text fingerprint distance in bits
    #[arg(long, value_name = "BITS", value_parser = clap::value_parser!(u32).range(0..=64))]
    pub text_threshold: Option<u32>,

    /// Maximum median page distance in bits
    #[arg(long, value_name = "BITS", value_parser = clap::value_parser!(u32).range(0..=64))]
    pub visual_threshold: Option<u32>,

    /// Minimum containment ratio for partial matches (0.0 - 1.0)
    #[arg(long, value_name = "RATIO", value_parser = parse_ratio)]
    pub partial_threshold: Option<f64>,

    /// Maximum distance for two pages to count as the same page
    #[arg(long, value_name = "BITS", value_parser = clap::value_parser!(u32).range(0..=64))]
    pub page_match_threshold: Option<u32>,

    /// Maximum page-count skew tolerated by alignment (0.0 - 1.0, exclusive)
    #[arg(long, value_name = "RATIO", value_parser = parse_skew)]
    pub max_page_skew: Option<f64>,

    /// Only group documents of this kind (e.g. pdf, image)
    #[arg(long = "kind", value_name = "KIND")]
    pub file_kind: Option<String>,

    /// Output format for the pass summary
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the groups subcommand.
#[derive(Debug, Args)]
pub struct GroupsArgs {
    /// SQLite database holding the groups
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Page number, starting at 1
    #[arg(long, value_name = "N", default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Groups per page
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the fingerprint subcommand.
#[derive(Debug, Args)]
pub struct FingerprintArgs {
    /// File to fingerprint
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Which fingerprint to compute
    #[arg(short, long, value_enum, default_value = "all")]
    pub method: FingerprintMethod,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Fingerprint selection for the fingerprint subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FingerprintMethod {
    /// Every fingerprint that applies to the file
    All,
    /// SHA-256 of the raw bytes
    Sha256,
    /// SHA-256 of the decoded pixels
    Canonical,
    /// 64-bit perceptual hash of the image
    Phash,
    /// 64-bit SimHash of the text
    Simhash,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a ratio in `0.0..=1.0`.
///
/// # Examples
///
/// ```
/// use neardupe::cli::parse_ratio;
///
/// assert_eq!(parse_ratio("0.7").unwrap(), 0.7);
/// assert!(parse_ratio("1.5").is_err());
/// ```
///
/// # Errors
///
/// Returns an error for non-numbers and values outside the range.
pub fn parse_ratio(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("Ratio must be between 0.0 and 1.0, got {value}"));
    }
    Ok(value)
}

/// Parse a skew in `0.0..1.0`.
///
/// # Errors
///
/// Returns an error for non-numbers and values outside the range.
pub fn parse_skew(s: &str) -> Result<f64, String> {
    let value = parse_ratio(s)?;
    if value >= 1.0 {
        return Err("Skew must be below 1.0".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ratio("0").unwrap(), 0.0);
        assert_eq!(parse_ratio(" 0.25 ").unwrap(), 0.25);
        assert_eq!(parse_ratio("1").unwrap(), 1.0);
        assert!(parse_ratio("").is_err());
        assert!(parse_ratio("abc").is_err());
        assert!(parse_ratio("-0.1").is_err());
        assert!(parse_ratio("1.01").is_err());
    }

    #[test]
    fn test_parse_skew_excludes_one() {
        assert_eq!(parse_skew("0.5").unwrap(), 0.5);
        assert!(parse_skew("1.0").is_err());
    }

    #[test]
    fn test_cli_parse_group_basic() {
        let cli = Cli::try_parse_from(["neardupe", "group"]).unwrap();
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Commands::Group(args) => {
                assert!(args.database.is_none());
                assert!(args.text_threshold.is_none());
                assert_eq!(args.output, OutputFormat::Text);
            }
            _ => panic!("Expected Group command"),
        }
    }

    #[test]
    fn test_cli_parse_group_with_options() {
        let cli = Cli::try_parse_from([
            "neardupe",
            "-v",
            "group",
            "--database",
            "dupes.db",
            "--text-threshold",
            "4",
            "--visual-threshold",
            "10",
            "--partial-threshold",
            "0.9",
            "--kind",
            "pdf",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Group(args) => {
                assert_eq!(args.database, Some(PathBuf::from("dupes.db")));
                assert_eq!(args.text_threshold, Some(4));
                assert_eq!(args.visual_threshold, Some(10));
                assert_eq!(args.partial_threshold, Some(0.9));
                assert_eq!(args.file_kind.as_deref(), Some("pdf"));
                assert_eq!(args.output, OutputFormat::Json);
            }
            _ => panic!("Expected Group command"),
        }
    }

    #[test]
    fn test_cli_rejects_out_of_range_thresholds() {
        assert!(Cli::try_parse_from(["neardupe", "group", "--text-threshold", "65"]).is_err());
        assert!(Cli::try_parse_from(["neardupe", "group", "--partial-threshold", "2"]).is_err());
        assert!(Cli::try_parse_from(["neardupe", "group", "--max-page-skew", "1"]).is_err());
    }

    #[test]
    fn test_cli_parse_groups_pagination() {
        let cli = Cli::try_parse_from(["neardupe", "groups", "--page", "3", "--page-size", "20"]).unwrap();
        match cli.command {
            Commands::Groups(args) => {
                assert_eq!(args.page, 3);
                assert_eq!(args.page_size, Some(20));
            }
            _ => panic!("Expected Groups command"),
        }
        assert!(Cli::try_parse_from(["neardupe", "groups", "--page", "0"]).is_err());
    }

    #[test]
    fn test_cli_parse_fingerprint() {
        let cli = Cli::try_parse_from(["neardupe", "fingerprint", "scan.png", "--method", "phash"]).unwrap();
        match cli.command {
            Commands::Fingerprint(args) => {
                assert_eq!(args.path, PathBuf::from("scan.png"));
                assert_eq!(args.method, FingerprintMethod::Phash);
            }
            _ => panic!("Expected Fingerprint command"),
        }
        assert!(Cli::try_parse_from(["neardupe", "fingerprint"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["neardupe", "groups", "--json-errors", "--config", "nd.toml"]).unwrap();
        assert!(cli.json_errors);
        assert_eq!(cli.config, Some(PathBuf::from("nd.toml")));
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["neardupe", "-v", "-q", "group"]).is_err());
    }

    #[test]
    fn test_cli_invalid_subcommand() {
        assert!(Cli::try_parse_from(["neardupe", "scan", "/path"]).is_err());
    }
}
