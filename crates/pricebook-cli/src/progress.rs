//! Progress bar helpers for long synchronization runs.

use indicatif::{ProgressBar, ProgressStyle};
use pricebook_engine::ProgressSnapshot;

/// Create the synchronization progress bar.
pub fn create_sync_progress() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len}")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );
    pb
}

/// Push an engine snapshot into the bar.
pub fn render(pb: &ProgressBar, snapshot: &ProgressSnapshot) {
    if snapshot.workload > 0 {
        pb.set_length(snapshot.workload);
        pb.set_position(snapshot.done.min(snapshot.workload));
    }
    match &snapshot.region {
        Some(region) => pb.set_message(format!("{} ({region})", snapshot.phase)),
        None => pb.set_message(snapshot.phase.clone()),
    }
}
