//! Progress accounting for dispatch calls

use indicatif::{ProgressBar, ProgressStyle};

/// Completion counters for one dispatch call
///
/// Updates are released in steps of `step` completions, plus one final
/// partial step when the last item completes. The reported count therefore
/// never runs ahead of the completed count and reaches `total` exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    completed: u64,
    total: u64,
    step: u64,
    reported: u64,
}

impl ProgressState {
    /// Start counting towards `total`, reporting every `step` completions
    pub fn new(total: u64, step: u64) -> Self {
        Self {
            completed: 0,
            total,
            step: step.max(1),
            reported: 0,
        }
    }

    /// Count one completed item; returns the increment to report, if any
    pub fn record_completion(&mut self) -> Option<u64> {
        self.completed += 1;

        let mut delta = 0;
        if self.completed % self.step == 0 {
            delta += self.step;
        }
        if self.completed == self.total {
            delta += self.total % self.step;
        }

        if delta == 0 {
            return None;
        }
        self.reported += delta;
        Some(delta)
    }

    /// Items completed so far
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Items expected in total
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Sum of all increments released so far
    pub fn reported(&self) -> u64 {
        self.reported
    }

    /// Whether every item has completed
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// Drives a progress bar from a [`ProgressState`]
pub(crate) struct ProgressReporter {
    state: ProgressState,
    bar: ProgressBar,
    label: String,
}

impl ProgressReporter {
    pub(crate) fn new(label: &str, total: u64, step: u64, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(total)
        } else {
            ProgressBar::hidden()
        };
        bar.set_length(total);
        if let Ok(style) =
            ProgressStyle::with_template("{prefix:>8} [{bar:40.cyan/blue}] {pos}/{len} {elapsed_precise}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.set_prefix(label.to_string());

        Self {
            state: ProgressState::new(total, step),
            bar,
            label: label.to_string(),
        }
    }

    pub(crate) fn record_completion(&mut self) {
        if let Some(delta) = self.state.record_completion() {
            self.bar.inc(delta);
            tracing::debug!(
                label = %self.label,
                reported = self.state.reported(),
                total = self.state.total(),
                "dispatch progress"
            );
        }
        if self.state.is_complete() {
            self.bar.finish();
        }
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> u64 {
        self.bar.position()
    }
}
