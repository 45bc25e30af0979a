//! # Core Actor Plumbing
//!
//! Building blocks shared by every actor in the crate.
//!
//! ## Key Types
//!
//! - [`FrameworkError`]: failures of the message exchange itself (closed mailbox, dropped
//!   reply channel, no reply in time).
//! - [`ask`] / [`ask_unbounded`]: the request/reply exchange with a bounded wait.
//! - [`Registration`]: a handle that runs its release action exactly once.

use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

// =============================================================================
// 1. ERRORS
// =============================================================================

/// Errors that can occur while exchanging messages with an actor.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FrameworkError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
    #[error("Ask timed out after {0:?}")]
    AskTimeout(Duration),
}

/// Type alias for the one-shot reply channel carried by every request envelope.
pub type Response<T, E> = oneshot::Sender<Result<T, E>>;

// =============================================================================
// 2. THE ASK PATTERN
// =============================================================================

/// Sends a request built by `request` and waits at most `timeout` for the reply.
///
/// # Architecture Note
/// The wait covers both enqueueing (a full mailbox counts against the deadline) and the
/// reply itself. A reply that never arrives surfaces as [`FrameworkError::AskTimeout`],
/// which is the transient failure callers such as schema resolution retry on.
pub async fn ask<M, T, E>(
    mailbox: &mpsc::Sender<M>,
    timeout: Duration,
    request: impl FnOnce(Response<T, E>) -> M,
) -> Result<T, E>
where
    E: From<FrameworkError>,
{
    let (respond_to, response) = oneshot::channel();
    let exchange = async move {
        if mailbox.send(request(respond_to)).await.is_err() {
            return Err(FrameworkError::ActorClosed);
        }
        response.await.map_err(|_| FrameworkError::ActorDropped)
    };
    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(FrameworkError::AskTimeout(timeout).into()),
    }
}

/// [`ask`] for actors with an unbounded mailbox.
pub async fn ask_unbounded<M, T, E>(
    mailbox: &mpsc::UnboundedSender<M>,
    timeout: Duration,
    request: impl FnOnce(Response<T, E>) -> M,
) -> Result<T, E>
where
    E: From<FrameworkError>,
{
    let (respond_to, response) = oneshot::channel();
    mailbox
        .send(request(respond_to))
        .map_err(|_| FrameworkError::ActorClosed)?;
    match tokio::time::timeout(timeout, response).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(FrameworkError::ActorDropped.into()),
        Err(_) => Err(FrameworkError::AskTimeout(timeout).into()),
    }
}

// =============================================================================
// 3. REGISTRATIONS
// =============================================================================

/// Handle to a live registration (a mount point, a schema source provider, ...).
///
/// The release action runs exactly once: on the first [`close`](Registration::close) or
/// when the handle is dropped, whichever comes first. A closed handle is never reopened.
pub struct Registration {
    name: String,
    on_close: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Registration {
    pub fn new(name: impl Into<String>, on_close: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            on_close: Some(Box::new(on_close)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.on_close.is_none()
    }

    pub fn close(&mut self) {
        if let Some(release) = self.on_close.take() {
            debug!(registration = %self.name, "Closing registration");
            release();
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
