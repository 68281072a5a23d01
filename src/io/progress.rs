//! Per-stage progress bars for the long-running pipeline steps

use crate::io::configuration::PROGRESS_BAR_WIDTH;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::LazyLock;

static STAGE_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template(&format!(
            "[{{elapsed_precise}}] {{msg:>10}} [{{bar:{PROGRESS_BAR_WIDTH}.cyan/blue}}] {{pos}}/{{len}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
});

/// Progress display for one pipeline stage
///
/// A hidden bar accepts the same calls and draws nothing, so callers never
/// branch on whether output is enabled.
#[derive(Debug, Clone)]
pub struct StageProgress {
    bar: ProgressBar,
}

impl StageProgress {
    /// Visible bar for `total` items labelled with the stage name
    pub fn new(stage: &str, total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(STAGE_STYLE.clone());
        bar.set_message(stage.to_owned());
        Self { bar }
    }

    /// Bar that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Visible bar unless `quiet` is set
    pub fn for_stage(stage: &str, total: usize, quiet: bool) -> Self {
        if quiet {
            Self::hidden()
        } else {
            Self::new(stage, total)
        }
    }

    /// Advance by one item
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    /// Number of items completed so far
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
