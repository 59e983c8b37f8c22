//! The job engine: drives one job's pipeline from ingestion to a terminal
//! state.
//!
//! One cooperative async task per job. The loop suspends only at the page
//! fetch, the selector wait and the inter-item delay; the stop flag is
//! observed at the top of each iteration, so the item in flight always
//! finishes before cancellation takes effect.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::job::models::JobStatus;
use crate::fetch::{PageFetcher, PageSession};
use crate::ingest::{extract_companies, IngestError, SheetReader};
use crate::registry::JobHandle;

use super::csv_sink::{AppendOutcome, CsvSink};
use super::resolver::LinkResolver;
use super::telemetry::{self, SpeedThrottle};

#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub results_dir: PathBuf,
    pub search_base_url: String,
    pub navigation_timeout: Duration,
    pub selector_timeout: Duration,
    /// Pause between companies to bound the request rate against the
    /// upstream search service.
    pub item_delay: Duration,
}

enum LoopOutcome {
    Completed,
    Stopped,
}

/// Engine instance shared by all jobs; each `run` call owns one job's
/// pipeline for the duration of an epoch.
pub struct JobWorker {
    fetcher: Arc<dyn PageFetcher>,
    reader: Arc<dyn SheetReader>,
    /// Bounds the number of jobs holding a fetch session at once.
    limiter: Arc<Semaphore>,
    resolver: LinkResolver,
    settings: WorkerSettings,
}

impl JobWorker {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        reader: Arc<dyn SheetReader>,
        limiter: Arc<Semaphore>,
        settings: WorkerSettings,
    ) -> Self {
        let resolver = LinkResolver::new(
            settings.search_base_url.clone(),
            settings.navigation_timeout,
            settings.selector_timeout,
        );
        Self {
            fetcher,
            reader,
            limiter,
            resolver,
            settings,
        }
    }

    /// Process one job to a terminal state. Never panics the surrounding
    /// task; every failure path lands the job in `error`.
    pub async fn run(&self, job: Arc<JobHandle>) {
        let _permit = match self.limiter.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => None,
        };

        info!(job_id = %job.id, "engine starting");
        job.with_state(|state| state.begin_epoch(Utc::now()));

        let companies = match self.load_companies(&job) {
            Ok(companies) => companies,
            Err(err) => {
                self.fail(&job, err.to_string());
                return;
            }
        };

        let source_path = job.with_state(|state| state.source_path.clone());
        let output_path = self.derive_output_path(&source_path);
        let mut sink = match CsvSink::create(&output_path) {
            Ok(sink) => sink,
            Err(err) => {
                self.fail(
                    &job,
                    format!("could not create output file {}: {err}", output_path.display()),
                );
                return;
            }
        };
        job.with_state(|state| state.output_path = Some(output_path.clone()));

        let mut session = match self.fetcher.acquire_session().await {
            Ok(session) => session,
            Err(err) => {
                self.fail(&job, format!("could not acquire fetch session: {err}"));
                return;
            }
        };

        let outcome = self
            .process_companies(&job, &companies, session.as_mut(), &mut sink)
            .await;

        // The session is released on every exit path of the loop above.
        session.close().await;

        job.with_state(|state| match outcome {
            LoopOutcome::Stopped => state.finish(JobStatus::Stopped, Utc::now()),
            LoopOutcome::Completed => {
                state.progress = 100;
                state.finish(JobStatus::Completed, Utc::now());
            }
        });

        let (status, processed, success) = job.with_state(|state| {
            (state.status, state.processed, state.success_count)
        });
        info!(
            job_id = %job.id,
            status = ?status,
            processed,
            success,
            output = %output_path.display(),
            "engine finished"
        );
    }

    /// Ingest on the first epoch; later epochs reuse the immutable list.
    fn load_companies(&self, job: &JobHandle) -> Result<Vec<String>, IngestError> {
        let (existing, source_path) =
            job.with_state(|state| (state.companies.clone(), state.source_path.clone()));
        if !existing.is_empty() {
            return Ok(existing);
        }

        let sheet = self.reader.read_sheet(&source_path)?;
        let companies = extract_companies(&sheet)?;
        info!(
            job_id = %job.id,
            companies = companies.len(),
            source = %source_path.display(),
            "source ingested"
        );

        job.with_state(|state| {
            state.companies = companies.clone();
            state.total = companies.len();
        });
        Ok(companies)
    }

    async fn process_companies(
        &self,
        job: &JobHandle,
        companies: &[String],
        session: &mut dyn PageSession,
        sink: &mut CsvSink,
    ) -> LoopOutcome {
        let total = companies.len();
        job.with_state(|state| state.total = total);

        let mut throttle = SpeedThrottle::new();

        for (index, company) in companies.iter().enumerate() {
            if job.stop_requested() {
                info!(job_id = %job.id, index, "stop requested, leaving loop");
                return LoopOutcome::Stopped;
            }

            job.with_state(|state| {
                state.current_company = company.clone();
                state.progress = (((index + 1) * 100) / total) as u32;
            });

            let started = Instant::now();
            let resolution = self.resolver.resolve(company, session).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            job.with_state(|state| {
                state.record_result(company, resolution.website.clone(), elapsed_ms)
            });

            match sink.append_row(company, &resolution.website) {
                AppendOutcome::Written => {}
                AppendOutcome::Degraded => {
                    warn!(job_id = %job.id, company = %company, "row recorded in degraded form")
                }
                AppendOutcome::Dropped => {
                    error!(job_id = %job.id, company = %company, "row lost, continuing")
                }
            }

            let processed = index + 1;
            if throttle.should_recompute(processed) {
                job.with_state(|state| {
                    if let Some(start) = state.start_time {
                        let elapsed = (Utc::now() - start).to_std().unwrap_or_default();
                        state.processing_speed = telemetry::processing_speed(processed, elapsed);
                    }
                });
            }

            sleep(self.settings.item_delay).await;
        }

        LoopOutcome::Completed
    }

    fn fail(&self, job: &JobHandle, message: String) {
        error!(job_id = %job.id, error = %message, "job failed");
        job.with_state(|state| {
            state.error = Some(message);
            state.finish(JobStatus::Error, Utc::now());
        });
    }

    /// `<source stem>_<timestamp>_<random suffix>.csv` under the results
    /// dir; unique per epoch so repeated runs never collide.
    fn derive_output_path(&self, source_path: &Path) -> PathBuf {
        let stem = source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("results");
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        self.settings
            .results_dir
            .join(format!("{stem}_{timestamp}_{suffix}.csv"))
    }
}
