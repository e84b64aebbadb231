//! Advisory progress display for event scans.

use indicatif::{HumanCount, ProgressBar, ProgressStyle};

/// Rows between progress bar updates.
pub const PROGRESS_STRIDE: u64 = 10_000;

/// Approximate row counts of the large event logs. Only used to size the
/// progress bar. Matches on the last path component, so `icu/chartevents`
/// and `chartevents` size the same bar.
pub fn expected_rows(source: &str) -> Option<u64> {
    let table = source.rsplit(['/', '\\']).next().unwrap_or(source);
    match table.to_ascii_lowercase().as_str() {
        "chartevents" => Some(313_645_063),
        "labevents" => Some(118_171_367),
        "outputevents" => Some(4_234_967),
        "inputevents" => Some(8_978_893),
        "procedureevents" => Some(696_092),
        _ => None,
    }
}

/// Progress bar for scanning `source`; hidden when `enabled` is false.
pub fn event_progress(source: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = match expected_rows(source) {
        Some(total) => {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {human_pos}/{human_len} rows ({per_sec}) {msg}",
            ) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {human_pos} rows {msg}")
            {
                bar.set_style(style);
            }
            bar
        }
    };
    bar.set_message(source.to_string());
    bar
}

pub fn finish_message(source: &str, rows: u64) -> String {
    format!("{source}: {} rows", HumanCount(rows))
}
