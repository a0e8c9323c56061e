use crate::generator::engine::SyntheticEngine;
use crate::workflow::config::SessionConfig;
use anyhow::Context;
use radarsimcore::capture::{prepare_engine, run_capture, CaptureProgress};
use radarsimcore::distributed::{topology, AggregationReport, NodeOutput, MASTER_RANK};
use radarsimcore::format::{
    check_state_capacity, resolve_output_dir, verify_header_layout, FileWriter, SessionHeader,
    StateArchive,
};
use radarsimcore::prelude::CaptureError;
use radarsimcore::telemetry::{CaptureMetrics, LogManager, MetricsRecorder};
use radarsimcore::SimulationEngine;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub struct SessionSummary {
    pub report: AggregationReport,
    pub metrics: CaptureMetrics,
}

#[derive(Clone)]
pub struct Runner {
    config: SessionConfig,
    metrics: Arc<MetricsRecorder>,
}

impl Runner {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MetricsRecorder::new()),
        }
    }

    /// Checks that must pass before any node starts capturing.
    pub fn preflight(&self) -> anyhow::Result<()> {
        self.config.validate()?;
        verify_header_layout().context("checking the session header layout")?;
        Ok(())
    }

    pub async fn execute(&self) -> anyhow::Result<SessionSummary> {
        self.preflight()?;
        let output_dir = if self.config.writes_files() {
            resolve_output_dir(self.config.output_dir.as_deref())?
        } else {
            PathBuf::from(".")
        };
        let writer = FileWriter::new(output_dir).with_logger(LogManager::for_rank(MASTER_RANK));

        let mut tasks = Vec::with_capacity(self.config.nodes);
        for link in topology(self.config.nodes)? {
            let rank = link.rank();
            let config = self.config.clone();
            let metrics = Arc::clone(&self.metrics);
            let writer = writer.clone();
            tasks.push(tokio::spawn(async move {
                let output =
                    tokio::task::spawn_blocking(move || capture_node(&config, rank, &metrics))
                        .await
                        .with_context(|| format!("capture task of node {} failed", rank))??;
                link.finish(output, writer)
                    .await
                    .with_context(|| format!("node {} could not deliver its output", rank))
            }));
        }

        let mut report = None;
        let mut errors = Vec::new();
        for (rank, task) in tasks.into_iter().enumerate() {
            let outcome = task
                .await
                .with_context(|| format!("node {} task panicked", rank))
                .and_then(|result| result);
            match outcome {
                Ok(node_report) if rank == MASTER_RANK => report = Some(node_report),
                Ok(_) => {}
                Err(err) => {
                    log::error!("node {}: {:#}", rank, err);
                    errors.push(err);
                }
            }
        }
        if let Some(err) = root_cause(errors) {
            return Err(err);
        }
        let report = report.context("master node produced no report")?;

        for file in &report.written {
            self.metrics.record_file(file.file.bytes);
        }
        for _ in &report.failures {
            self.metrics.record_write_failure();
        }
        Ok(SessionSummary {
            report,
            metrics: self.metrics.snapshot(),
        })
    }
}

/// A lost link is a symptom; prefer the error that caused it.
fn root_cause(errors: Vec<anyhow::Error>) -> Option<anyhow::Error> {
    let is_link_loss = |err: &anyhow::Error| {
        matches!(
            err.downcast_ref::<CaptureError>(),
            Some(CaptureError::PeerDisconnected { .. })
        )
    };
    let mut fallback = None;
    for err in errors {
        if !is_link_loss(&err) {
            return Some(err);
        }
        fallback.get_or_insert(err);
    }
    fallback
}

/// Runs one node's capture and packages what the master must persist.
fn capture_node(
    config: &SessionConfig,
    rank: usize,
    metrics: &MetricsRecorder,
) -> anyhow::Result<NodeOutput> {
    let logger = LogManager::for_rank(rank);
    let mut engine = SyntheticEngine::new(&config.engine_config(rank))
        .context("initializing the scatterer engine")?;
    if config.save_state {
        check_state_capacity(&engine).context("sizing the simulation state")?;
    }

    let settings = config.capture_settings(rank)?;
    let frames = prepare_engine(&mut engine, &settings).map_err(|err| {
        if err.is_startup_fatal() {
            logger.failure(&format!("session refused before capture: {}", err));
        }
        err
    })?;
    logger.record(&format!(
        "Session started (seed = {}, {} turbulence frames)",
        engine.random_seed(),
        frames
    ));
    logger.record(&format!(
        "Emulating {} frame{} with {} scatter bodies",
        settings.num_pulses,
        if settings.num_pulses > 1 { "s" } else { "" },
        engine.scatterer_count()
    ));

    let mut scan = config.scan_state()?;
    let initial = scan.clone();
    let show_progress = config.show_progress && rank == MASTER_RANK;
    let outcome = run_capture(&mut engine, &mut scan, &settings, |progress| {
        if show_progress {
            eprint!("{}\r", progress_line(&progress));
            let _ = std::io::stderr().flush();
        }
    })?;
    if show_progress {
        eprint!("{:100}\r", "");
    }
    metrics.record_pulses(outcome.pulses);
    metrics.record_boundaries(outcome.boundary_events);

    let header = SessionHeader::capture(&engine, &initial, outcome.pulses)?;
    let state = if config.save_state {
        Some(StateArchive::capture(&mut engine)?)
    } else {
        None
    };
    Ok(NodeOutput {
        rank,
        header,
        pulses: outcome.buffer,
        state,
    })
}

pub fn progress_line(progress: &CaptureProgress) -> String {
    match progress {
        CaptureProgress::WarmingUp {
            completed,
            total,
            percent,
        } => format!("Warming up ... {} out of {} ... {:.2}%  ", completed, total, percent),
        CaptureProgress::Capturing { report, beam } => format!(
            "k {:5}   (e{:6.2}, a{:5.2})   {:.2} fps   {:.2}%   eta {:.0} second{}   ",
            report.completed,
            beam.elevation,
            beam.azimuth,
            report.fps,
            report.percent,
            report.eta_seconds,
            if report.eta_seconds > 1.5 { "s" } else { "" }
        ),
    }
}
