// Job Registry - caller-facing control surface
//
// One registered definition per job key; at most one active run per key in
// this process. Cross-process exclusion is a documented caller obligation,
// not something the registry can enforce.

use crate::application::engine::{BatchEngine, EngineConfig, RunSummary};
use crate::application::progress::ProgressTracker;
use crate::application::stop::{stop_channel, StopHandle};
use crate::domain::{ItemOutcome, JobCheckpoint, JobKey, JobProgress, RunState};
use crate::error::{AppError, Result};
use crate::port::{CheckpointStore, EligibilityPredicate, ItemProcessor, PageSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything needed to run one job type
pub struct JobDefinition {
    pub job_key: JobKey,
    pub description: String,
    pub source: Arc<dyn PageSource>,
    pub processor: Arc<dyn ItemProcessor>,
    pub eligibility: Option<EligibilityPredicate>,
    pub config: EngineConfig,
}

/// Listing entry: registered job plus its live state and resume position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOverview {
    pub job_key: JobKey,
    pub description: String,
    pub state: RunState,
    /// Present when a prior run left a resume position (operator can
    /// choose resume vs reset)
    pub checkpoint: Option<JobCheckpoint>,
}

struct ActiveRun {
    stop: StopHandle,
    join: JoinHandle<RunSummary>,
}

struct RegisteredJob {
    definition: JobDefinition,
    progress: Arc<ProgressTracker>,
    active: Mutex<Option<ActiveRun>>,
}

/// Registry of batch jobs with start/stop/progress/reset operations
pub struct JobRegistry {
    checkpoints: Arc<dyn CheckpointStore>,
    jobs: HashMap<JobKey, RegisteredJob>,
}

impl JobRegistry {
    pub fn new(checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            checkpoints,
            jobs: HashMap::new(),
        }
    }

    /// Register a job definition (composition-root time, before serving)
    pub fn register(&mut self, definition: JobDefinition) {
        info!(job_key = %definition.job_key, "Registered batch job");
        self.jobs.insert(
            definition.job_key.clone(),
            RegisteredJob {
                definition,
                progress: Arc::new(ProgressTracker::new()),
                active: Mutex::new(None),
            },
        );
    }

    fn job(&self, job_key: &str) -> Result<&RegisteredJob> {
        self.jobs
            .get(job_key)
            .ok_or_else(|| AppError::NotFound(format!("Unknown job: {job_key}")))
    }

    /// Spawn a run for the job. Rejects a second concurrent start of the
    /// same key with Conflict. `missing_only` overrides the registered
    /// default when given.
    pub fn start(&self, job_key: &str, missing_only: Option<bool>) -> Result<()> {
        let job = self.job(job_key)?;
        let mut active = job.active.lock().unwrap();
        if let Some(run) = active.as_ref() {
            if !run.join.is_finished() {
                return Err(AppError::Conflict(format!(
                    "Job already running: {job_key}"
                )));
            }
        }

        let mut config = job.definition.config.clone();
        if let Some(missing_only) = missing_only {
            config.missing_only = missing_only;
        }

        let run_id = uuid::Uuid::new_v4().to_string();
        let engine = BatchEngine::new(
            job.definition.job_key.clone(),
            self.checkpoints.clone(),
            job.definition.source.clone(),
            job.definition.processor.clone(),
            job.definition.eligibility.clone(),
            config,
        );
        let progress = job.progress.clone();
        // Fresh stop channel per run, reset to "not requested"
        let (stop_handle, mut stop_token) = stop_channel();

        info!(job_key = %job_key, run_id = %run_id, "Starting batch job");
        let join = tokio::spawn(async move {
            engine.run(&progress, &mut stop_token).await
        });

        *active = Some(ActiveRun {
            stop: stop_handle,
            join,
        });
        Ok(())
    }

    /// Request the running job to stop at the next item boundary.
    /// Returns false when no run was active (benign).
    pub fn request_stop(&self, job_key: &str) -> Result<bool> {
        let job = self.job(job_key)?;
        let active = job.active.lock().unwrap();
        match active.as_ref() {
            Some(run) if !run.join.is_finished() => {
                info!(job_key = %job_key, "Stop requested");
                run.stop.request_stop();
                Ok(true)
            }
            _ => {
                warn!(job_key = %job_key, "Stop requested but job is not running");
                Ok(false)
            }
        }
    }

    /// Point-in-time progress snapshot plus the recent item outcomes
    pub fn progress(&self, job_key: &str) -> Result<(JobProgress, Vec<ItemOutcome>)> {
        let job = self.job(job_key)?;
        Ok((job.progress.snapshot(), job.progress.recent()))
    }

    /// Drop the resume position so the next run starts from zero.
    /// Rejected while the job is running.
    pub async fn reset_checkpoint(&self, job_key: &str) -> Result<()> {
        let job = self.job(job_key)?;
        {
            let active = job.active.lock().unwrap();
            if let Some(run) = active.as_ref() {
                if !run.join.is_finished() {
                    return Err(AppError::Conflict(format!(
                        "Cannot reset checkpoint while job is running: {job_key}"
                    )));
                }
            }
        }
        self.checkpoints.clear(job_key).await?;
        info!(job_key = %job_key, "Checkpoint reset");
        Ok(())
    }

    /// All registered jobs with live state and checkpoint presence
    pub async fn jobs(&self) -> Result<Vec<JobOverview>> {
        let mut overviews = Vec::with_capacity(self.jobs.len());
        for job in self.jobs.values() {
            let checkpoint = self.checkpoints.load(&job.definition.job_key).await?;
            overviews.push(JobOverview {
                job_key: job.definition.job_key.clone(),
                description: job.definition.description.clone(),
                state: job.progress.snapshot().state,
                checkpoint,
            });
        }
        overviews.sort_by(|a, b| a.job_key.cmp(&b.job_key));
        Ok(overviews)
    }

    /// Request stop on every running job (daemon shutdown path)
    pub fn stop_all(&self) {
        for key in self.jobs.keys() {
            let _ = self.request_stop(key);
        }
    }

    /// Await the active run of a job, if any (tests and shutdown)
    pub async fn wait_for(&self, job_key: &str) -> Result<Option<RunSummary>> {
        let job = self.job(job_key)?;
        let run = job.active.lock().unwrap().take();
        match run {
            Some(run) => {
                let summary = run
                    .join
                    .await
                    .map_err(|e| AppError::Internal(format!("run task panicked: {e}")))?;
                Ok(Some(summary))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::CheckpointMode;
    use crate::domain::{BatchItem, Cursor};
    use crate::port::checkpoint_store::mocks::MemoryCheckpointStore;
    use crate::port::item_processor::mocks::ScriptedProcessor;
    use crate::port::page_source::mocks::VecPageSource;
    use serde_json::json;
    use std::time::Duration;

    fn definition(job_key: &str, items: u32, delay: Duration) -> JobDefinition {
        let items: Vec<BatchItem> = (1..=items)
            .map(|i| {
                BatchItem::new(
                    format!("item-{i:03}"),
                    Cursor::new(format!("{i:03}")),
                    json!({}),
                )
            })
            .collect();
        JobDefinition {
            job_key: job_key.to_string(),
            description: "test job".to_string(),
            source: Arc::new(VecPageSource::new(items)),
            processor: Arc::new(ScriptedProcessor::new()),
            eligibility: None,
            config: EngineConfig {
                page_size: 10,
                item_delay: delay,
                checkpoint_mode: CheckpointMode::PerItem,
                ..EngineConfig::default()
            },
        }
    }

    fn registry_with(definitions: Vec<JobDefinition>) -> JobRegistry {
        let mut registry = JobRegistry::new(Arc::new(MemoryCheckpointStore::new()));
        for def in definitions {
            registry.register(def);
        }
        registry
    }

    #[tokio::test]
    async fn start_runs_to_completion() {
        let registry = registry_with(vec![definition("token_cleanup", 5, Duration::ZERO)]);

        registry.start("token_cleanup", None).unwrap();
        let summary = registry.wait_for("token_cleanup").await.unwrap().unwrap();
        assert_eq!(summary.processed, 5);

        let (progress, _) = registry.progress("token_cleanup").unwrap();
        assert_eq!(progress.state, RunState::Completed);
    }

    #[tokio::test]
    async fn concurrent_start_of_same_key_is_conflict() {
        // Long inter-item delay keeps the first run alive
        let registry =
            registry_with(vec![definition("wiki_content_fill", 50, Duration::from_secs(60))]);

        registry.start("wiki_content_fill", None).unwrap();
        let err = registry.start("wiki_content_fill", None).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert!(registry.request_stop("wiki_content_fill").unwrap());
        registry.wait_for("wiki_content_fill").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_job_key_is_not_found() {
        let registry = registry_with(vec![]);
        assert!(matches!(
            registry.start("nope", None),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            registry.progress("nope"),
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn stop_without_active_run_is_benign() {
        let registry = registry_with(vec![definition("token_cleanup", 3, Duration::ZERO)]);
        assert!(!registry.request_stop("token_cleanup").unwrap());
    }

    #[tokio::test]
    async fn reset_checkpoint_rejected_while_running() {
        let registry =
            registry_with(vec![definition("metadata_migration", 50, Duration::from_secs(60))]);

        registry.start("metadata_migration", None).unwrap();
        let err = registry
            .reset_checkpoint("metadata_migration")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        registry.request_stop("metadata_migration").unwrap();
        registry.wait_for("metadata_migration").await.unwrap();
        registry.reset_checkpoint("metadata_migration").await.unwrap();
    }

    #[tokio::test]
    async fn overview_reports_checkpoint_presence() {
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        checkpoints
            .save("social_link_fetch", &Cursor::new("040"))
            .await
            .unwrap();

        let mut registry = JobRegistry::new(checkpoints);
        registry.register(definition("social_link_fetch", 5, Duration::ZERO));
        registry.register(definition("duplicate_removal", 5, Duration::ZERO));

        let jobs = registry.jobs().await.unwrap();
        assert_eq!(jobs.len(), 2);
        let by_key: HashMap<_, _> = jobs.into_iter().map(|j| (j.job_key.clone(), j)).collect();
        assert!(by_key["social_link_fetch"].checkpoint.is_some());
        assert!(by_key["duplicate_removal"].checkpoint.is_none());
        assert_eq!(by_key["duplicate_removal"].state, RunState::Idle);
    }
}
