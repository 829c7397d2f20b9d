//! Progress aggregation
//!
//! Counters are updated from the scheduler loop only: `completed` when a
//! task finishes, everything else when its record is flushed. Displayed
//! accuracy therefore always describes the written prefix.

use crate::record::{Classify, Verdict};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Snapshot of the run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub completed: usize,
    pub written: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub errors: usize,
}

impl Counters {
    /// Share of judged records that were correct, in percent.
    ///
    /// Errors are excluded from the denominator. Zero when nothing was judged.
    pub fn accuracy(&self) -> f64 {
        let judged = self.correct + self.incorrect;
        if judged == 0 {
            0.0
        } else {
            self.correct as f64 / judged as f64 * 100.0
        }
    }
}

/// Tracks run progress and mirrors it onto a progress bar.
pub struct ProgressAggregator {
    counters: Counters,
    bar: ProgressBar,
}

impl std::fmt::Debug for ProgressAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressAggregator")
            .field("counters", &self.counters)
            .field("hidden", &self.bar.is_hidden())
            .finish()
    }
}

impl ProgressAggregator {
    /// Aggregator without any terminal output.
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total as u64);
        Self {
            counters: Counters::default(),
            bar,
        }
    }

    /// Aggregator drawing a progress bar on stderr.
    pub fn with_display(total: usize) -> Self {
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);

        let aggregator = Self {
            counters: Counters::default(),
            bar,
        };
        aggregator.refresh_message();
        aggregator
    }

    /// A task finished, whether or not its record could be written yet.
    pub fn record_completed(&mut self) {
        self.counters.completed += 1;
        self.bar.inc(1);
    }

    /// Records reached the output, in order.
    pub fn record_flushed<'a, R, I>(&mut self, records: I)
    where
        R: Classify + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut any = false;
        for record in records {
            any = true;
            self.counters.written += 1;
            match record.verdict() {
                Verdict::Correct => self.counters.correct += 1,
                Verdict::Incorrect => self.counters.incorrect += 1,
                Verdict::Error => self.counters.errors += 1,
            }
        }
        if any {
            self.refresh_message();
        }
    }

    pub fn snapshot(&self) -> Counters {
        self.counters
    }

    /// Render the counters the way the bar shows them.
    pub fn message(&self) -> String {
        let c = &self.counters;
        format!(
            "{} | {} | {}",
            format!("{} written", c.written).cyan(),
            format!("{:.2}% correct", c.accuracy()).magenta(),
            format!("{} API errors", c.errors).red()
        )
    }

    /// Stop the bar, leaving the final state visible.
    pub fn finish(&self) {
        self.refresh_message();
        self.bar.finish();
    }

    fn refresh_message(&self) {
        self.bar.set_message(self.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Verdict);

    impl Classify for Fixed {
        fn verdict(&self) -> Verdict {
            self.0
        }
    }

    #[test]
    fn test_accuracy_excludes_errors() {
        let counters = Counters {
            correct: 3,
            incorrect: 1,
            errors: 10,
            ..Default::default()
        };
        assert!((counters.accuracy() - 75.0).abs() < f64::EPSILON);
        assert_eq!(Counters::default().accuracy(), 0.0);
    }

    #[test]
    fn test_completed_and_flushed_are_counted_separately() {
        let mut progress = ProgressAggregator::new(3);

        progress.record_completed();
        progress.record_completed();
        assert_eq!(progress.snapshot().completed, 2);
        assert_eq!(progress.snapshot().written, 0);

        let flushed = [Fixed(Verdict::Correct), Fixed(Verdict::Error)];
        progress.record_flushed(&flushed);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.written, 2);
        assert_eq!(snapshot.correct, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.incorrect, 0);
    }

    #[test]
    fn test_message_mentions_every_counter() {
        colored::control::set_override(false);
        let mut progress = ProgressAggregator::new(2);
        progress.record_flushed(&[Fixed(Verdict::Correct), Fixed(Verdict::Incorrect)]);
        assert_eq!(progress.message(), "2 written | 50.00% correct | 0 API errors");
    }
}
