//! Human-readable terminal output.
//!
//! Colors come from yansi; call [`yansi::disable`] (done by the CLI for
//! `--no-color` / `NO_COLOR`) to get plain text.

use std::io::{self, Write};

use yansi::Paint;

use super::{FingerprintReport, GroupListing};
use crate::duplicates::models::{Evidence, GroupMember};
use crate::duplicates::GroupingSummary;
use crate::store::Page;

/// Text renderer for command results.
pub struct TextOutput;

impl TextOutput {
    /// Render the summary of a grouping pass.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_summary<W: Write>(writer: &mut W, summary: &GroupingSummary) -> io::Result<()> {
        writeln!(
            writer,
            "{} {} groups, {} members from {} documents in {:.2?}",
            "Grouping complete:".bold(),
            summary.groups_written.green(),
            summary.members_written,
            summary.documents,
            summary.duration
        )?;
        let rows = [
            ("canonical", summary.pairs_compared.canonical, summary.matches.canonical),
            ("text-near", summary.pairs_compared.text_near, summary.matches.text_near),
            ("visual", summary.pairs_compared.visual, summary.matches.visual),
            ("partial", summary.pairs_compared.partial, summary.matches.partial),
        ];
        for (tier, compared, matched) in rows {
            writeln!(writer, "  {:<10} {:>8} compared {:>6} matched", tier.cyan(), compared, matched)?;
        }
        Ok(())
    }

    /// Render one page of stored groups.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_groups<W: Write>(
        writer: &mut W,
        page: Page,
        total_groups: u64,
        groups: &[GroupListing],
    ) -> io::Result<()> {
        if groups.is_empty() {
            writeln!(writer, "{}", "No groups on this page.".dim())?;
        }
        for listing in groups {
            let group = &listing.group;
            writeln!(
                writer,
                "{} {}  {}  updated {}",
                "Group".bold(),
                group.id.bold(),
                &group.group_key[..12.min(group.group_key.len())].dim(),
                group.updated_at.format("%Y-%m-%d %H:%M:%S")
            )?;
            for member in &listing.members {
                let marker = if member.document_id == group.representative_document_id {
                    "*".green().bold().to_string()
                } else {
                    " ".to_string()
                };
                writeln!(
                    writer,
                    "  {marker} doc {:<8} {:<10} {}",
                    member.document_id,
                    member.reason.as_str().yellow(),
                    describe(member)
                )?;
            }
        }

        let pages = total_groups.div_ceil(u64::from(page.size)).max(1);
        writeln!(
            writer,
            "{}",
            format!("Page {} of {} ({} groups)", page.number, pages, total_groups).dim()
        )
    }

    /// Render fingerprints of one file.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_fingerprints<W: Write>(writer: &mut W, report: &FingerprintReport) -> io::Result<()> {
        writeln!(writer, "{}", report.path.bold())?;
        if let Some(ref sha) = report.sha256 {
            writeln!(writer, "  {:<10} {}", "sha256".cyan(), sha)?;
        }
        if let Some(ref canonical) = report.canonical {
            writeln!(writer, "  {:<10} {}", "canonical".cyan(), canonical)?;
        }
        if let Some(phash) = report.phash {
            writeln!(writer, "  {:<10} {:016x}", "phash".cyan(), phash)?;
        }
        if let Some(simhash) = report.simhash {
            writeln!(writer, "  {:<10} {:016x}", "simhash".cyan(), simhash)?;
        }
        Ok(())
    }
}

fn describe(member: &GroupMember) -> String {
    match &member.evidence {
        Evidence::Canonical => "identical content".to_string(),
        Evidence::TextNear { distance } => format!("text distance {distance}"),
        Evidence::Visual { distance, alignment } => format!(
            "median page distance {distance} (pages {}+{} ~ {}+{})",
            alignment.a_start, alignment.a_len, alignment.b_start, alignment.b_len
        ),
        Evidence::Partial {
            ratio,
            relation,
            matched_pages,
            ..
        } => format!("{relation}, {matched_pages} pages shared ({:.0}% contained)", ratio * 100.0),
    }
}
