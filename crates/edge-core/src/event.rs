//! Incoming fetch events and their background-task lifetime.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::future::{join_all, BoxFuture};

use crate::error::{EdgeError, Result};
use crate::request::Request;

type Task = BoxFuture<'static, Result<()>>;

/// One incoming event: the inbound request plus the hook used to keep
/// the invocation alive until background work has settled.
pub struct FetchEvent {
    request: Request,
    pending: Mutex<Vec<Task>>,
}

impl FetchEvent {
    /// Create an event for an inbound request.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// The request that triggered this event.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Register background work that must finish before the invocation ends.
    ///
    /// The task is not polled here; it runs when the host settles the
    /// handle returned by [`FetchEvent::take_pending`].
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::pin(task));
    }

    /// Number of registered tasks not yet handed to the host.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Hand every registered task over to the host.
    pub fn take_pending(&self) -> PendingTasks {
        let tasks = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        PendingTasks { tasks }
    }
}

/// Background tasks the host must await before finishing an invocation.
#[must_use = "pending tasks are dropped unless settled"]
#[derive(Default)]
pub struct PendingTasks {
    tasks: Vec<Task>,
}

impl PendingTasks {
    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether there is nothing to wait for.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drive every task to completion.
    ///
    /// All tasks run to the end even when one fails; the first failure is
    /// returned.
    pub async fn settle(self) -> Result<()> {
        let count = self.tasks.len();
        let results = join_all(self.tasks).await;
        let mut first_error: Option<EdgeError> = None;
        for result in results {
            if let Err(err) = result {
                tracing::warn!(error = %err, "background task failed");
                first_error.get_or_insert(err);
            }
        }
        tracing::debug!(count, "background tasks settled");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for FetchEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchEvent")
            .field("request", &self.request)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl std::fmt::Debug for PendingTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTasks")
            .field("len", &self.tasks.len())
            .finish()
    }
}
