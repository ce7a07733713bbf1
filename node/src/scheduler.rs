// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Bounded Concurrency Scheduler
//!
//! Gates futures so that at most `concurrency` run at once. Waiters are
//! resumed strictly in arrival order: tokio's semaphore is fair, so a permit
//! released by a finishing task goes to the oldest waiter.
//!
//! # Invariants
//! - `running() <= concurrency()` at all times
//! - A slot is released when the task finishes, fails, or is dropped
//! - After `close()`, waiting and new callers get `SchedulerClosed`

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::errors::EngineError;

#[derive(Debug)]
pub struct Scheduler {
    permits: Arc<Semaphore>,
    concurrency: usize,
    running: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

/// Decrements a counter when dropped.
struct CountGuard(Arc<AtomicUsize>);

impl CountGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for CountGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Scheduler {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            running: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `task` once a slot is free.
    pub async fn schedule<F, T>(&self, task: F) -> Result<T, EngineError>
    where
        F: Future<Output = T>,
    {
        let permit = {
            let _waiting = CountGuard::enter(&self.queued);
            self.permits
                .acquire()
                .await
                .map_err(|_| EngineError::SchedulerClosed)?
        };

        let _running = CountGuard::enter(&self.running);
        let output = task.await;
        drop(permit);
        Ok(output)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Tasks currently holding a slot.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Callers waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.permits.close();
        tracing::debug!("Scheduler closed");
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
