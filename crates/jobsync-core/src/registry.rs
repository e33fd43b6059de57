//! Implementation registry.
//!
//! Built once at startup, then shared read-only behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::LookupError;
use crate::handle::{Job, JobHandle};

/// Resolves an implementation id to its [`JobHandle`].
pub trait JobLookup: Send + Sync {
    fn lookup(&self, implementation_id: &str) -> Result<Arc<JobHandle>, LookupError>;
}

/// Maps implementation ids to job handles.
#[derive(Default)]
pub struct ImplementationRegistry {
    handles: HashMap<String, Arc<JobHandle>>,
}

impl ImplementationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job implementation under its own id.
    pub fn register_job(&mut self, job: Arc<dyn Job>) -> Arc<JobHandle> {
        let id = job.id().to_string();
        self.register(id, JobHandle::new(job))
    }

    /// Register a handle under `implementation_id`, replacing any previous one.
    pub fn register(
        &mut self,
        implementation_id: impl Into<String>,
        handle: JobHandle,
    ) -> Arc<JobHandle> {
        let implementation_id = implementation_id.into();
        let handle = Arc::new(handle);
        if self
            .handles
            .insert(implementation_id.clone(), handle.clone())
            .is_some()
        {
            warn!("Job implementation '{}' registered twice, keeping the last one", implementation_id);
        } else {
            info!("Registered job implementation '{}' ({})", implementation_id, handle.name());
        }
        handle
    }

    /// Registered handles, sorted by implementation id.
    pub fn handles(&self) -> Vec<Arc<JobHandle>> {
        let mut handles: Vec<_> = self.handles.values().cloned().collect();
        handles.sort_by(|a, b| a.implementation_id().cmp(b.implementation_id()));
        handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl JobLookup for ImplementationRegistry {
    fn lookup(&self, implementation_id: &str) -> Result<Arc<JobHandle>, LookupError> {
        self.handles
            .get(implementation_id)
            .cloned()
            .ok_or_else(|| LookupError {
                implementation_id: implementation_id.to_string(),
            })
    }
}
