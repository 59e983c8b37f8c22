use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_web::{HttpResponse, ResponseError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::validation::ErrorResponse;
use crate::registry::JobRegistry;
use crate::worker::JobWorker;

use super::dto::{JobListEntry, JobSnapshot};
use super::models::JobStatus;

/// Service-level errors
#[derive(Debug)]
pub enum ServiceError {
    /// No job registered under the given id
    NotFound(Uuid),

    /// Start requested while the job is already processing
    AlreadyProcessing(Uuid),

    /// Output requested before the job has produced one
    NotReady(Uuid),

    /// The request payload or uploaded file is unusable
    BadRequest(String),

    /// Filesystem failure while handling an upload or download
    Storage(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotFound(id) => write!(f, "Job not found: {}", id),
            ServiceError::AlreadyProcessing(id) => {
                write!(f, "Job is already processing: {}", id)
            }
            ServiceError::NotReady(id) => write!(f, "Job has no output yet: {}", id),
            ServiceError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ServiceError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::NotFound(id) => {
                warn!("Job not found: {}", id);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": format!("Job with id {} not found", id)}),
                })
            }
            ServiceError::AlreadyProcessing(id) => {
                warn!("Job already processing: {}", id);
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Already processing".to_string(),
                    fields: serde_json::json!({"message": "Job is already processing"}),
                })
            }
            ServiceError::NotReady(id) => {
                warn!("Job output not ready: {}", id);
                HttpResponse::Conflict().json(ErrorResponse {
                    error: "Not ready".to_string(),
                    fields: serde_json::json!({"message": "Job has not produced an output file yet"}),
                })
            }
            ServiceError::BadRequest(msg) => {
                warn!("Bad request: {}", msg);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Bad request".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Storage error occurred"}),
                })
            }
        }
    }
}

/// Job control surface consumed by the HTTP layer.
///
/// All mutation of job records goes through here (and the engine tasks it
/// spawns); handlers never touch the registry directly.
pub struct JobService {
    registry: Arc<JobRegistry>,
    worker: Arc<JobWorker>,
    upload_dir: PathBuf,
}

impl JobService {
    pub fn new(registry: Arc<JobRegistry>, worker: Arc<JobWorker>, upload_dir: PathBuf) -> Self {
        Self {
            registry,
            worker,
            upload_dir,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Register a new job for an ingested source file.
    pub fn create_job(&self, source_path: PathBuf) -> Uuid {
        let handle = self.registry.create(source_path);
        info!("Service: job {} registered", handle.id);
        handle.id
    }

    /// Start (or restart) processing. The status flips to `processing`
    /// before this returns; the engine runs on its own task.
    pub fn start_processing(&self, id: Uuid) -> Result<(), ServiceError> {
        let handle = self.registry.get(id).ok_or(ServiceError::NotFound(id))?;

        // Check-and-flip under one lock so concurrent starts cannot race.
        handle.with_state(|job| match job.status {
            JobStatus::Processing => Err(ServiceError::AlreadyProcessing(id)),
            _ => {
                job.status = JobStatus::Processing;
                Ok(())
            }
        })?;
        handle.reset_stop();

        let worker = self.worker.clone();
        let engine_handle = handle.clone();
        let task = tokio::spawn(async move {
            worker.run(engine_handle).await;
        });
        handle.set_task(task);

        info!("Service: job {} processing started", id);
        Ok(())
    }

    /// Best-effort cooperative stop; takes effect at the next iteration
    /// boundary of the engine loop.
    pub fn request_stop(&self, id: Uuid) -> Result<(), ServiceError> {
        let handle = self.registry.get(id).ok_or(ServiceError::NotFound(id))?;
        handle.request_stop();
        info!("Service: stop requested for job {}", id);
        Ok(())
    }

    pub fn get_status(&self, id: Uuid) -> Result<JobSnapshot, ServiceError> {
        let handle = self.registry.get(id).ok_or(ServiceError::NotFound(id))?;
        Ok(handle.with_state(|job| JobSnapshot::capture(job)))
    }

    /// Path of the current epoch's CSV, available once the job reached
    /// `completed` or `stopped` with an assigned output.
    pub fn get_output_path(&self, id: Uuid) -> Result<PathBuf, ServiceError> {
        let handle = self.registry.get(id).ok_or(ServiceError::NotFound(id))?;
        handle.with_state(|job| match (job.status, job.output_path.as_ref()) {
            (JobStatus::Completed | JobStatus::Stopped, Some(path)) => Ok(path.clone()),
            _ => Err(ServiceError::NotReady(id)),
        })
    }

    pub fn list_jobs(&self) -> Vec<JobListEntry> {
        self.registry
            .handles()
            .iter()
            .map(|handle| handle.with_state(|job| JobListEntry::capture(job)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::*;
    use crate::fetch::mock::{MockPage, ScriptedFetcher};
    use crate::ingest::CsvSheetReader;
    use crate::worker::WorkerSettings;

    struct Fixture {
        _dirs: (tempfile::TempDir, tempfile::TempDir),
        service: JobService,
        source: PathBuf,
    }

    fn service_with(steps: Vec<Result<MockPage, String>>, source_contents: &str) -> Fixture {
        let upload_dir = tempfile::tempdir().expect("upload dir");
        let results_dir = tempfile::tempdir().expect("results dir");
        let source = upload_dir.path().join("companies.csv");
        let mut file = std::fs::File::create(&source).expect("source file");
        file.write_all(source_contents.as_bytes()).expect("write");

        let worker = JobWorker::new(
            Arc::new(ScriptedFetcher::new(steps)),
            Arc::new(CsvSheetReader),
            Arc::new(Semaphore::new(1)),
            WorkerSettings {
                results_dir: results_dir.path().to_path_buf(),
                search_base_url: "https://search.example/search".to_string(),
                navigation_timeout: Duration::from_millis(50),
                selector_timeout: Duration::from_millis(20),
                item_delay: Duration::ZERO,
            },
        );
        let service = JobService::new(
            Arc::new(JobRegistry::new()),
            Arc::new(worker),
            upload_dir.path().to_path_buf(),
        );
        Fixture {
            _dirs: (upload_dir, results_dir),
            service,
            source,
        }
    }

    #[tokio::test]
    async fn fresh_job_reports_uploaded_status() {
        let fixture = service_with(vec![], "Company\nAcme\n");
        let id = fixture.service.create_job(fixture.source.clone());

        let snapshot = fixture.service.get_status(id).expect("known job");
        assert_eq!(snapshot.status, JobStatus::Uploaded);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(fixture.service.list_jobs().len(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let fixture = service_with(vec![], "Company\nAcme\n");
        let id = Uuid::new_v4();

        assert!(matches!(
            fixture.service.get_status(id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            fixture.service.start_processing(id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            fixture.service.request_stop(id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            fixture.service.get_output_path(id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn start_is_rejected_while_processing() {
        let fixture = service_with(vec![], "Company\nAcme\n");
        let id = fixture.service.create_job(fixture.source.clone());

        // Pin the record in `processing` to observe the rejection without
        // racing a real engine run.
        let handle = fixture.service.registry.get(id).expect("handle");
        handle.with_state(|job| job.status = JobStatus::Processing);

        assert!(matches!(
            fixture.service.start_processing(id),
            Err(ServiceError::AlreadyProcessing(_))
        ));
    }

    #[tokio::test]
    async fn output_path_requires_a_terminal_output() {
        let fixture = service_with(vec![], "Company\nAcme\n");
        let id = fixture.service.create_job(fixture.source.clone());

        assert!(matches!(
            fixture.service.get_output_path(id),
            Err(ServiceError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn started_job_runs_to_completion() {
        let fixture = service_with(
            vec![Ok(MockPage::with_links(&[("Acme", "https://acme.com")]))],
            "Company\nAcme\n",
        );
        let id = fixture.service.create_job(fixture.source.clone());

        fixture.service.start_processing(id).expect("start");

        // Deterministic wait: join the engine task instead of polling.
        let handle = fixture.service.registry.get(id).expect("handle");
        handle.take_task().expect("task spawned").await.expect("engine task");

        let snapshot = fixture.service.get_status(id).expect("status");
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.processed, 1);
        assert_eq!(snapshot.success_count, 1);

        let output = fixture.service.get_output_path(id).expect("output ready");
        assert!(output.exists());
    }
}
