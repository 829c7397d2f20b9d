//! Bounded scheduler
//!
//! Every task is spawned at once. Concurrency of remote calls is bounded by
//! the [`ConcurrencyGate`] the clients share, not by the scheduler holding
//! tasks back, so prompt assembly and chunking overlap freely.
//!
//! One loop consumes completions in arrival order and is the only writer of
//! the sink and the progress counters.

use crate::error::{EvalError, Result};
use crate::progress::{Counters, ProgressAggregator};
use crate::record::Classify;
use crate::shutdown::ShutdownCoordinator;
use crate::sink::{OrderedSink, RecordWriter};
use crate::task::Task;
use llm::ConcurrencyGate;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How a scheduler run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub counters: Counters,
    /// The run stopped on a shutdown request.
    pub cancelled: bool,
    /// Indices that never reached the output, ascending.
    pub unwritten: Vec<usize>,
    /// Indices whose task died without producing a record.
    pub panicked: Vec<usize>,
    /// The output writer failed and the run stopped.
    pub write_error: Option<String>,
}

impl RunSummary {
    /// Every task produced exactly one written record.
    pub fn is_complete(&self) -> bool {
        self.unwritten.is_empty() && self.write_error.is_none()
    }
}

/// Drives tasks to completion behind a shared concurrency gate.
#[derive(Debug, Clone)]
pub struct BoundedScheduler {
    gate: ConcurrencyGate,
}

impl BoundedScheduler {
    /// Create a scheduler admitting `max_concurrent` remote calls at once.
    pub fn new(max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(EvalError::Config(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            gate: ConcurrencyGate::new(max_concurrent)?,
        })
    }

    /// Gate to hand to every client of this run.
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn max_concurrent(&self) -> usize {
        self.gate.capacity()
    }

    /// Run `work` once per task and write the results in index order.
    ///
    /// Task indices must be exactly `0..tasks.len()` in any order. `work`
    /// must not fail: it turns every failure into a record itself. A writer
    /// failure stops the run: remaining tasks are aborted and the error is
    /// reported in [`RunSummary::write_error`].
    pub async fn run<P, R, W, F, Fut>(
        &self,
        tasks: Vec<Task<P>>,
        work: F,
        sink: &mut OrderedSink<R, W>,
        progress: &mut ProgressAggregator,
        shutdown: &ShutdownCoordinator,
    ) -> Result<RunSummary>
    where
        P: Send + 'static,
        R: Classify + Send + 'static,
        W: RecordWriter<R>,
        F: Fn(P) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = tasks.len();
        validate_indices(&tasks)?;

        info!(
            tasks = total,
            max_concurrent = self.max_concurrent(),
            "Scheduling tasks"
        );

        let mut in_flight = JoinSet::new();
        let mut index_of = HashMap::with_capacity(total);
        for task in tasks {
            let index = task.index;
            let fut = work(task.payload);
            let handle = in_flight.spawn(async move { (index, fut.await) });
            index_of.insert(handle.id(), index);
        }

        let mut cancelled = false;
        let mut panicked = Vec::new();
        let mut write_error = None;

        loop {
            let joined = tokio::select! {
                biased;
                _ = shutdown.wait_for_shutdown() => {
                    warn!(in_flight = in_flight.len(), "Cancelling in-flight tasks");
                    in_flight.abort_all();
                    cancelled = true;
                    break;
                }
                joined = in_flight.join_next() => joined,
            };

            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((index, record)) => {
                    progress.record_completed();
                    let flush = sink.offer(index, record)?;
                    if !flush.records.is_empty() {
                        debug!(
                            index,
                            flushed = flush.records.len(),
                            next_to_write = sink.next_to_write(),
                            "Flushed records"
                        );
                    }
                    progress.record_flushed(&flush.records);

                    if let Some(e) = flush.error {
                        error!(
                            index = sink.next_to_write(),
                            error = %e,
                            "Failed to write record, stopping run"
                        );
                        in_flight.abort_all();
                        write_error = Some(e.to_string());
                        break;
                    }
                }
                Err(e) => {
                    let index = index_of.get(&e.id()).copied();
                    warn!(index = ?index, error = %e, "Task ended without a record");
                    if let Some(index) = index {
                        panicked.push(index);
                    }
                }
            }
        }

        // Drain aborted tasks so nothing outlives the run
        while in_flight.join_next().await.is_some() {}

        panicked.sort_unstable();
        let unwritten: Vec<usize> = (sink.next_to_write()..total).collect();
        let summary = RunSummary {
            total,
            counters: progress.snapshot(),
            cancelled,
            unwritten,
            panicked,
            write_error,
        };

        if summary.is_complete() {
            info!(written = summary.counters.written, "All tasks written");
        } else {
            warn!(
                written = summary.counters.written,
                missing = summary.unwritten.len(),
                first_missing = summary.unwritten.first().copied(),
                cancelled,
                write_error = summary.write_error.as_deref(),
                "Run ended with unwritten tasks"
            );
        }

        Ok(summary)
    }
}

fn validate_indices<P>(tasks: &[Task<P>]) -> Result<()> {
    let mut seen = vec![false; tasks.len()];
    for task in tasks {
        match seen.get_mut(task.index) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => {
                return Err(EvalError::Config(format!(
                    "task index {} appears more than once",
                    task.index
                )))
            }
            None => {
                return Err(EvalError::Config(format!(
                    "task index {} is out of range for {} tasks",
                    task.index,
                    tasks.len()
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Verdict;
    use crate::task::enumerate;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Echo(usize);

    impl Classify for Echo {
        fn verdict(&self) -> Verdict {
            Verdict::Correct
        }
    }

    #[test]
    fn test_zero_capacity_is_a_config_error() {
        assert!(matches!(BoundedScheduler::new(0), Err(EvalError::Config(_))));
        assert_eq!(BoundedScheduler::new(3).unwrap().max_concurrent(), 3);
    }

    #[test]
    fn test_validate_indices() {
        assert!(validate_indices(&[Task::new(1, ()), Task::new(0, ())]).is_ok());
        assert!(validate_indices(&[Task::new(0, ()), Task::new(0, ())]).is_err());
        assert!(validate_indices(&[Task::new(0, ()), Task::new(2, ())]).is_err());
        assert!(validate_indices::<()>(&[]).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverse_completion_is_written_in_order() {
        let scheduler = BoundedScheduler::new(4).unwrap();
        let mut sink = OrderedSink::new(Vec::new());
        let mut progress = ProgressAggregator::new(4);

        let summary = scheduler
            .run(
                enumerate(0..4usize),
                |i| async move {
                    tokio::time::sleep(Duration::from_millis(100 * (4 - i) as u64)).await;
                    Echo(i)
                },
                &mut sink,
                &mut progress,
                &ShutdownCoordinator::new(),
            )
            .await
            .unwrap();

        assert!(summary.is_complete());
        assert!(!summary.cancelled);
        assert_eq!(summary.counters.written, 4);
        assert_eq!(sink.into_writer(), vec![Echo(0), Echo(1), Echo(2), Echo(3)]);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let scheduler = BoundedScheduler::new(1).unwrap();
        let mut sink = OrderedSink::new(Vec::<Echo>::new());
        let mut progress = ProgressAggregator::new(0);

        let summary = scheduler
            .run(
                Vec::<Task<usize>>::new(),
                |i| async move { Echo(i) },
                &mut sink,
                &mut progress,
                &ShutdownCoordinator::new(),
            )
            .await
            .unwrap();

        assert!(summary.is_complete());
        assert_eq!(summary.total, 0);
    }

    struct FailOnIndex {
        fail_on: usize,
        written: Vec<usize>,
    }

    impl RecordWriter<Echo> for FailOnIndex {
        fn write_record(&mut self, record: &Echo) -> Result<()> {
            if record.0 == self.fail_on {
                return Err(EvalError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.written.push(record.0);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_stops_run_with_counters_matching_output() {
        let scheduler = BoundedScheduler::new(3).unwrap();
        let mut sink = OrderedSink::new(FailOnIndex {
            fail_on: 1,
            written: Vec::new(),
        });
        let mut progress = ProgressAggregator::new(3);

        // index 1 completes first and waits; index 0 then flushes 0 and fails on 1
        let delays = [100u64, 50, 1_000];
        let summary = scheduler
            .run(
                enumerate(0..3usize),
                move |i| async move {
                    tokio::time::sleep(Duration::from_millis(delays[i])).await;
                    Echo(i)
                },
                &mut sink,
                &mut progress,
                &ShutdownCoordinator::new(),
            )
            .await
            .unwrap();

        assert_eq!(sink.writer().written, vec![0]);
        assert_eq!(summary.counters.written, 1);
        assert_eq!(summary.counters.completed, 2);
        assert!(summary.write_error.as_deref().unwrap().contains("disk full"));
        assert_eq!(summary.unwritten, vec![1, 2]);
        assert!(!summary.cancelled);
        assert!(!summary.is_complete());
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported_not_written() {
        let scheduler = BoundedScheduler::new(2).unwrap();
        let mut sink = OrderedSink::new(Vec::new());
        let mut progress = ProgressAggregator::new(3);

        let summary = scheduler
            .run(
                enumerate(0..3usize),
                |i| async move {
                    if i == 1 {
                        panic!("boom");
                    }
                    Echo(i)
                },
                &mut sink,
                &mut progress,
                &ShutdownCoordinator::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.panicked, vec![1]);
        assert_eq!(summary.unwritten, vec![1, 2]);
        assert_eq!(summary.counters.completed, 2);
        assert_eq!(summary.counters.written, 1);
        assert_eq!(sink.pending_indices().collect::<Vec<_>>(), vec![2]);
    }
}
