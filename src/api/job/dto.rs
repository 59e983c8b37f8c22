use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::worker::telemetry;

use super::models::{CompanyResult, Job, JobStatus};

/// How many of the most recent results a status snapshot carries.
const RECENT_RESULTS: usize = 10;

/// Register an already uploaded file as a job.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(
        min = 1,
        max = 4096,
        message = "source_path must be a non-empty path"
    ))]
    pub source_path: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedResponse {
    pub job_id: Uuid,
    pub file_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub message: String,
    pub job_id: Uuid,
}

/// Point-in-time view of one job, assembled under the registry lock.
/// Speed and ETA may lag a few items behind; recomputation is throttled.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u32,
    pub current_company: String,
    pub processed: usize,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub success_ratio: f64,
    pub avg_processing_time_ms: f64,
    pub total_duration_sec: f64,
    pub eta_seconds: Option<f64>,
    pub processing_speed: f64,
    pub recent_results: Vec<CompanyResult>,
}

impl JobSnapshot {
    pub fn capture(job: &Job) -> Self {
        let total_duration_sec = job
            .start_time
            .map(|start| {
                let end = job.end_time.unwrap_or_else(Utc::now);
                (end - start).num_milliseconds().max(0) as f64 / 1000.0
            })
            .unwrap_or(0.0);

        let skip = job.results.len().saturating_sub(RECENT_RESULTS);
        let recent_results = job.results[skip..].to_vec();

        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            current_company: job.current_company.clone(),
            processed: job.processed,
            total: job.total,
            success_count: job.success_count,
            failure_count: job.failure_count,
            success_ratio: telemetry::success_ratio(job.success_count, job.processed),
            avg_processing_time_ms: telemetry::average_time_ms(&job.company_processing_times),
            total_duration_sec,
            eta_seconds: telemetry::eta_seconds(job.total, job.processed, job.processing_speed),
            processing_speed: job.processing_speed,
            recent_results,
        }
    }
}

/// One line of the jobs overview listing.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListEntry {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u32,
    pub file_name: String,
    pub result_count: usize,
}

impl JobListEntry {
    pub fn capture(job: &Job) -> Self {
        let file_name = job
            .source_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            file_name,
            result_count: job.results.len(),
        }
    }
}
