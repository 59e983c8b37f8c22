//! In-memory job store.
//!
//! The registry exclusively owns every `Job` record for the lifetime of
//! the process. The engine task for a job mutates its record through the
//! handle's short, await-free critical sections; the HTTP layer only ever
//! reads snapshots through the same accessor. The stop flag sits outside
//! the record so it can be raised from any task without touching the lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::api::job::models::Job;

/// Shared handle to one registered job.
pub struct JobHandle {
    pub id: Uuid,
    state: Mutex<Job>,
    should_stop: AtomicBool,
    /// Engine task of the current (or last) processing epoch.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl JobHandle {
    fn new(id: Uuid, source_path: PathBuf) -> Self {
        Self {
            id,
            state: Mutex::new(Job::new(id, source_path)),
            should_stop: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Run `f` against the job record under the state lock. Callers must
    /// not await inside `f`.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut Job) -> R) -> R {
        let mut guard = recover(self.state.lock());
        f(&mut guard)
    }

    /// Ask the engine to stop at the next iteration boundary. The item in
    /// flight always completes first.
    pub fn request_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    pub fn reset_stop(&self) {
        self.should_stop.store(false, Ordering::SeqCst);
    }

    pub fn set_task(&self, task: JoinHandle<()>) {
        *recover(self.task.lock()) = Some(task);
    }

    pub fn take_task(&self) -> Option<JoinHandle<()>> {
        recover(self.task.lock()).take()
    }
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Arc<JobHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job for `source_path` and return its handle.
    pub fn create(&self, source_path: PathBuf) -> Arc<JobHandle> {
        let id = Uuid::new_v4();
        let handle = Arc::new(JobHandle::new(id, source_path));
        self.write().insert(id, handle.clone());
        debug!(job_id = %id, "job registered");
        handle
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<JobHandle>> {
        self.read().get(&id).cloned()
    }

    pub fn handles(&self) -> Vec<Arc<JobHandle>> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Arc<JobHandle>>> {
        recover(self.jobs.read())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Arc<JobHandle>>> {
        recover(self.jobs.write())
    }
}

/// A poisoned lock here only means another task panicked mid-update; the
/// job record itself stays usable, so keep going with the inner value.
fn recover<G>(result: Result<G, std::sync::PoisonError<G>>) -> G {
    result.unwrap_or_else(|poisoned| poisoned.into_inner())
}
