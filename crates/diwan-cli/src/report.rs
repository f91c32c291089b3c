//! Operator-facing run reports.
//!
//! Plain text on stdout. The three non-write outcomes are always broken out
//! separately — each one calls for a different fix.

use diwan_recon::{
  provision::ProvisionReport,
  summary::{RunSummary, UnresolvedReason},
};

const UNRESOLVED_SAMPLE: usize = 10;

pub fn print_summary(title: &str, summary: &RunSummary) {
  println!("{title}");
  println!("  rows read        {}", summary.rows);
  println!("  created          {}", summary.created);
  println!("  updated          {}", summary.updated);
  println!("  unchanged        {}", summary.unchanged);
  println!("  skipped          {}", summary.skipped);
  if summary.superseded > 0 {
    println!("  superseded       {}", summary.superseded);
  }
  println!("  not found        {}", summary.not_found());
  println!("  ambiguous        {}", summary.ambiguous());
  println!("  write failures   {}", summary.failed());
  if summary.defaulted_numbers > 0 {
    println!(
      "  unparseable figures defaulted to 0: {}",
      summary.defaulted_numbers
    );
  }

  if !summary.unresolved.is_empty() {
    println!("\nunresolved rows (first {UNRESOLVED_SAMPLE}):");
    for entry in summary.unresolved.iter().take(UNRESOLVED_SAMPLE) {
      let reason = match entry.reason {
        UnresolvedReason::NotFound => "no match".to_owned(),
        UnresolvedReason::Ambiguous { candidates } => {
          format!("{candidates} candidates")
        }
      };
      println!("  row {:>4}  {}  ({reason})", entry.row_index + 1, entry.key);
    }
    if summary.unresolved.len() > UNRESOLVED_SAMPLE {
      println!("  … and {} more", summary.unresolved.len() - UNRESOLVED_SAMPLE);
    }
  }

  if !summary.failures.is_empty() {
    println!("\nrejected writes:");
    for failure in &summary.failures {
      let row = failure
        .row_index
        .map(|i| format!("row {}", i + 1))
        .unwrap_or_else(|| "manual".to_owned());
      let kind = if failure.constraint { "constraint" } else { "store" };
      println!(
        "  {row}  {}  {} -> {kind}: {}",
        failure.key, failure.relation, failure.message
      );
    }
  }
}

pub fn print_provision(report: &ProvisionReport) {
  println!("provisioning complete");
  println!("  usernames assigned  {}", report.provisioned);
  println!("  already provisioned {}", report.skipped);
  if !report.failures.is_empty() {
    println!("  failures            {}", report.failures.len());
    for failure in &report.failures {
      println!("    {}: {}", failure.key, failure.message);
    }
  }
}
