pub mod csv_sink;
pub mod job_worker;
pub mod resolver;
pub mod telemetry;

pub use job_worker::{JobWorker, WorkerSettings};
