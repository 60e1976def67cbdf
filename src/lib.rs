//! NearDupe - near-duplicate detection and grouping
//!
//! Groups documents and images that are the same content in different
//! encodings, scans, resolutions or excerpts. Matches are found in four tiers
//! of decreasing confidence (canonical hash, text fingerprint, page
//! alignment, partial page overlap) and persisted as idempotent groups with a
//! chosen representative and per-member evidence.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod output;
pub mod progress;
pub mod similarity;
pub mod store;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use cli::{Cli, Commands, FingerprintArgs, FingerprintMethod, GroupArgs, GroupsArgs, OutputFormat};
use config::Config;
use duplicates::DupeGrouper;
use error::ExitCode;
use output::{json, FingerprintReport, GroupListing, TextOutput};
use progress::Progress;
use store::{DupeStore, Page, SqliteStore};

/// Run the CLI and return the exit code to report.
///
/// # Errors
///
/// Returns an error if configuration, the store, or output fails.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }
    log::debug!(
        "neardupe {} starting (log level {})",
        env!("CARGO_PKG_VERSION"),
        logging::current_level_name()
    );

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Group(ref args) => {
            config.merge_group_args(args);
            config.validate()?;
            run_group(&config, args, cli.quiet)
        }
        Commands::Groups(ref args) => {
            config.merge_groups_args(args);
            config.validate()?;
            run_groups(&config, args)
        }
        Commands::Fingerprint(ref args) => run_fingerprint(args),
    }
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = config.database_path();
    log::debug!("Opening database at {}", path.display());
    SqliteStore::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn run_group(config: &Config, args: &GroupArgs, quiet: bool) -> anyhow::Result<ExitCode> {
    let mut store = open_store(config)?;
    let progress = Arc::new(Progress::new(quiet));
    let grouper = DupeGrouper::new(config.grouping_config().with_progress_callback(progress));

    let summary = grouper.run(&mut store).context("Grouping pass failed")?;
    let exit_code = if summary.groups_written == 0 {
        ExitCode::NoGroups
    } else {
        ExitCode::Success
    };

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Json => json::write_pretty(
            &mut stdout,
            &json::JsonSummary::from_grouping_summary(&summary, exit_code),
        )?,
        OutputFormat::Text => {
            if !quiet {
                TextOutput::write_summary(&mut stdout, &summary)?;
            }
        }
    }
    stdout.flush()?;
    Ok(exit_code)
}

fn run_groups(config: &Config, args: &GroupsArgs) -> anyhow::Result<ExitCode> {
    let store = open_store(config)?;
    let page = Page::new(args.page, config.page_size);

    let total = store.count_groups()?;
    let listings = store
        .list_groups(page)?
        .into_iter()
        .map(|group| -> anyhow::Result<GroupListing> {
            let members = store.group_members(group.id)?;
            Ok(GroupListing { group, members })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Json => json::write_pretty(&mut stdout, &json::JsonGroupPage::new(page, total, listings))?,
        OutputFormat::Text => TextOutput::write_groups(&mut stdout, page, total, &listings)?,
    }
    stdout.flush()?;

    Ok(if total == 0 { ExitCode::NoGroups } else { ExitCode::Success })
}

fn run_fingerprint(args: &FingerprintArgs) -> anyhow::Result<ExitCode> {
    let report = fingerprint_file(&args.path, args.method)?;
    let mut stdout = io::stdout().lock();
    match args.output {
        OutputFormat::Json => json::write_pretty(&mut stdout, &json::JsonFingerprint::from(&report))?,
        OutputFormat::Text => TextOutput::write_fingerprints(&mut stdout, &report)?,
    }
    stdout.flush()?;
    Ok(ExitCode::Success)
}

/// Compute the requested fingerprints of a local file.
///
/// With [`FingerprintMethod::All`], fingerprints that do not apply (an
/// undecodable image, non-UTF-8 text) are left out; an explicitly requested
/// one that does not apply is an error.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a requested fingerprint
/// cannot be computed.
pub fn fingerprint_file(path: &Path, method: FingerprintMethod) -> anyhow::Result<FingerprintReport> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let all = method == FingerprintMethod::All;
    let wants = |m: FingerprintMethod| all || method == m;

    let mut report = FingerprintReport {
        path: path.display().to_string(),
        ..FingerprintReport::default()
    };

    if wants(FingerprintMethod::Sha256) {
        report.sha256 = Some(fingerprint::sha256_hex(&bytes));
    }
    if wants(FingerprintMethod::Canonical) {
        match fingerprint::canonical_image_hash(&bytes) {
            Ok(hash) => report.canonical = Some(hash),
            Err(e) if all => log::debug!("No canonical hash for {}: {e}", path.display()),
            Err(e) => return Err(e).context("Failed to compute canonical hash"),
        }
    }
    if wants(FingerprintMethod::Phash) {
        match fingerprint::phash_bytes(&bytes) {
            Ok(hash) => report.phash = Some(hash),
            Err(e) if all => log::debug!("No perceptual hash for {}: {e}", path.display()),
            Err(e) => return Err(e).context("Failed to compute perceptual hash"),
        }
    }
    if wants(FingerprintMethod::Simhash) {
        match std::str::from_utf8(&bytes) {
            Ok(text) => report.simhash = fingerprint::simhash_text(text),
            Err(e) if all => log::debug!("No text fingerprint for {}: {e}", path.display()),
            Err(e) => return Err(e).context("File is not UTF-8 text"),
        }
    }

    Ok(report)
}
