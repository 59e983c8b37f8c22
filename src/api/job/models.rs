use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a job: `uploaded` until processing is requested, then
/// `processing` until one of the terminal states. A terminal job can only
/// re-enter `processing` through an explicit new start request, which
/// begins a fresh epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Completed,
    Stopped,
    Error,
}

/// One resolved row. `succeeded` is true iff `website` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyResult {
    pub company: String,
    pub website: String,
    pub processing_time_ms: u64,
    pub succeeded: bool,
}

/// In-memory record of one job. Owned by the registry; mutated only by the
/// engine task driving it (plus the stop flag, which lives outside this
/// struct on the registry handle).
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub source_path: PathBuf,
    pub status: JobStatus,
    /// Populated once by ingestion, immutable afterwards.
    pub companies: Vec<String>,
    /// Full processing history, in processing order, across epochs.
    pub results: Vec<CompanyResult>,
    pub processed: usize,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub progress: u32,
    pub current_company: String,
    pub company_processing_times: Vec<u64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Companies per second, refreshed on the telemetry throttle cadence.
    pub processing_speed: f64,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: Uuid, source_path: PathBuf) -> Self {
        Self {
            id,
            source_path,
            status: JobStatus::Uploaded,
            companies: Vec::new(),
            results: Vec::new(),
            processed: 0,
            total: 0,
            success_count: 0,
            failure_count: 0,
            progress: 0,
            current_company: String::new(),
            company_processing_times: Vec::new(),
            start_time: None,
            end_time: None,
            processing_speed: 0.0,
            output_path: None,
            error: None,
        }
    }

    /// Start a new processing epoch: counters, timings and the output path
    /// reset; `companies` and previously accumulated `results` survive.
    pub fn begin_epoch(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.processed = 0;
        self.success_count = 0;
        self.failure_count = 0;
        self.progress = 0;
        self.current_company.clear();
        self.company_processing_times.clear();
        self.processing_speed = 0.0;
        self.start_time = Some(now);
        self.end_time = None;
        self.output_path = None;
        self.error = None;
    }

    /// Record one finished item. Counters and the result list advance
    /// together so `success + failure == processed` and
    /// `results` never lags `processed` for a concurrent reader.
    pub fn record_result(&mut self, company: &str, website: String, elapsed_ms: u64) {
        let succeeded = !website.is_empty();
        self.company_processing_times.push(elapsed_ms);
        if succeeded {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.results.push(CompanyResult {
            company: company.to_string(),
            website,
            processing_time_ms: elapsed_ms,
            succeeded,
        });
        self.processed += 1;
    }

    /// Enter a terminal state and stamp the end of the epoch.
    pub fn finish(&mut self, status: JobStatus, now: DateTime<Utc>) {
        self.status = status;
        self.end_time = Some(now);
    }
}
