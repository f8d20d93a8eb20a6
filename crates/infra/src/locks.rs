//! Application-level per-project serialization.
//!
//! Validation and application are separate steps, so two operations on the
//! same project must not interleave between them. Operations on different
//! projects proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use pcbforge_core::ProjectId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("lock for project {0} is poisoned")]
    Poisoned(ProjectId),
}

/// One mutex per project, created on first use and dropped once no caller
/// holds or waits for it.
#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<ProjectId, Arc<Mutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock of `project_id`.
    pub fn with_project<T>(&self, project_id: ProjectId, f: impl FnOnce() -> T) -> Result<T, LockError> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| LockError::Poisoned(project_id))?;
            locks.entry(project_id).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().map_err(|_| LockError::Poisoned(project_id))?;
            f()
        };

        // Entries are only cloned under the map lock, so the count is exact here.
        if let Ok(mut locks) = self.locks.lock() {
            let idle = locks
                .get(&project_id)
                .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
            if idle {
                locks.remove(&project_id);
            }
        }
        Ok(result)
    }

    /// Projects that currently have a lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().map_or(0, |locks| locks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_project_runs_one_at_a_time() {
        let locks = Arc::new(ProjectLocks::new());
        let project_id = ProjectId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                thread::spawn(move || {
                    locks
                        .with_project(project_id, || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_inside.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(5));
                            inside.fetch_sub(1, Ordering::SeqCst);
                        })
                        .unwrap();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn returns_closure_result() {
        let locks = ProjectLocks::new();
        assert_eq!(locks.with_project(ProjectId::new(), || 42).unwrap(), 42);
    }

    #[test]
    fn idle_entries_are_dropped() {
        let locks = ProjectLocks::new();
        for _ in 0..10 {
            locks.with_project(ProjectId::new(), || ()).unwrap();
        }
        assert!(locks.is_empty());

        let project_id = ProjectId::new();
        locks
            .with_project(project_id, || assert_eq!(locks.len(), 1))
            .unwrap();
        assert!(locks.is_empty());
    }
}
