//! Run orchestration
//!
//! Wires configuration, strategy, clients, scheduler, sink and progress into
//! one evaluation run over a loaded dataset.

use crate::config::EvalConfig;
use crate::dataset;
use crate::error::{EvalError, Result};
use crate::progress::ProgressAggregator;
use crate::runner::TaskRunner;
use crate::scheduler::{BoundedScheduler, RunSummary};
use crate::shutdown::ShutdownCoordinator;
use crate::sink::{JsonlWriter, OrderedSink};
use crate::strategy::get_strategy;
use crate::task::QuestionItem;
use llm::{AuditLog, ChatTransport, ResilientClientConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tooling::logging::timed;
use tracing::{info, warn};
use uuid::Uuid;

/// Files a run writes for one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    /// `<save_dir>/<strategy>.jsonl`
    pub output: PathBuf,
    /// `<save_dir>/requests/<strategy>.jsonl`
    pub audit: PathBuf,
}

impl RunPaths {
    pub fn new(save_dir: &Path, strategy: &str) -> Self {
        let file = format!("{}.jsonl", strategy);
        Self {
            output: save_dir.join(&file),
            audit: save_dir.join("requests").join(file),
        }
    }

    /// Files of this run that already exist and would be appended to.
    pub fn existing(&self, audit_logging: bool) -> Vec<PathBuf> {
        let mut existing = Vec::new();
        if self.output.exists() {
            existing.push(self.output.clone());
        }
        if audit_logging && self.audit.exists() {
            existing.push(self.audit.clone());
        }
        existing
    }
}

/// Create output directories and deal with leftovers of an earlier run.
///
/// Leftover files are an error unless `delete_old` is set, in which case they
/// are removed.
pub fn prepare_output(paths: &RunPaths, audit_logging: bool, delete_old: bool) -> Result<()> {
    for dir in [paths.output.parent(), paths.audit.parent()].into_iter().flatten() {
        std::fs::create_dir_all(dir)?;
    }

    let existing = paths.existing(audit_logging);
    if existing.is_empty() {
        return Ok(());
    }
    if !delete_old {
        return Err(EvalError::OutputExists(existing));
    }
    for path in &existing {
        warn!(path = %path.display(), "Deleting output of an earlier run");
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Result of [`run_evaluation`].
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub strategy: String,
    pub model: String,
    pub paths: RunPaths,
    pub summary: RunSummary,
}

/// Evaluate `items` with the configured strategy against `transport`.
pub async fn run_evaluation(
    config: &EvalConfig,
    transport: Arc<dyn ChatTransport>,
    items: Vec<QuestionItem>,
    shutdown: &ShutdownCoordinator,
    show_progress: bool,
) -> Result<EvaluationReport> {
    config.validate()?;
    let run_id = Uuid::new_v4();
    let exec = &config.execution;

    let strategy = get_strategy(&exec.strategy)?;
    let paths = RunPaths::new(&config.output.save_dir, strategy.name());
    prepare_output(&paths, config.output.audit_logging, config.output.delete_old)?;

    let tasks = dataset::prepare(items, exec.processing_order, exec.max_entries, exec.seed);
    let scheduler = BoundedScheduler::new(exec.max_concurrent)?;

    let mut clients = ResilientClientConfig::new(
        transport,
        config.llm.model.clone(),
        scheduler.gate().clone(),
    )
    .with_retry_policy(config.retry.to_policy())
    .with_call_timeout(config.llm.timeout());
    if config.output.audit_logging {
        clients = clients.with_audit_log(Arc::new(AuditLog::new(&paths.audit)));
    }
    let runner = TaskRunner::new(strategy, clients);

    info!(
        run_id = %run_id,
        strategy = runner.strategy_name(),
        model = %config.llm.model,
        tasks = tasks.len(),
        output = %paths.output.display(),
        "Starting evaluation"
    );

    let mut sink = OrderedSink::new(JsonlWriter::open(&paths.output)?);
    let mut progress = if show_progress {
        ProgressAggregator::with_display(tasks.len())
    } else {
        ProgressAggregator::new(tasks.len())
    };

    let summary = timed(
        "evaluation",
        scheduler.run(
            tasks,
            |item: QuestionItem| {
                let runner = runner.clone();
                async move { runner.run(&item).await }
            },
            &mut sink,
            &mut progress,
            shutdown,
        ),
    )
    .await;
    progress.finish();
    let summary = summary?;

    let counters = summary.counters;
    info!(
        run_id = %run_id,
        written = counters.written,
        correct = counters.correct,
        incorrect = counters.incorrect,
        errors = counters.errors,
        accuracy = %format!("{:.2}", counters.accuracy()),
        cancelled = summary.cancelled,
        unwritten = summary.unwritten.len(),
        write_error = summary.write_error.as_deref(),
        "Evaluation finished"
    );

    Ok(EvaluationReport {
        run_id,
        strategy: runner.strategy_name().to_string(),
        model: config.llm.model.clone(),
        paths,
        summary,
    })
}
