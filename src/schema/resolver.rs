//! # Schema Resolution
//!
//! The slave side of schema bootstrap: keep asking the context factory for a context built
//! from the master's source identifiers until it succeeds or fails for a reason that
//! retrying cannot fix.
//!
//! ## Retry policy
//!
//! Every failure is handed to a [`RetryClassifier`]. The default, [`AskTimeoutClassifier`],
//! retries when the root cause is an ask-timeout (the master did not answer in time, for
//! example because it has not initialized yet) and aborts on anything else. There is no
//! upper bound on retries: the loop ends when the owning node actor aborts its task.
//!
//! Retry warnings are logged for the first five attempts and then for every tenth.

use super::{SchemaContextFactory, SchemaError};
use crate::framework::FrameworkError;
use crate::model::{DeviceId, SchemaContext, SourceIdentifier};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// What to do after a failed resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Abort,
}

/// Decides whether a resolution failure is transient.
pub trait RetryClassifier: Send + Sync {
    fn classify(&self, error: &SchemaError) -> RetryDecision;
}

/// Retries ask-timeouts, aborts on everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct AskTimeoutClassifier;

impl RetryClassifier for AskTimeoutClassifier {
    fn classify(&self, error: &SchemaError) -> RetryDecision {
        match root_cause(error).downcast_ref::<FrameworkError>() {
            Some(FrameworkError::AskTimeout(_)) => RetryDecision::Retry,
            _ => RetryDecision::Abort,
        }
    }
}

/// The innermost error of a `source()` chain.
pub fn root_cause<'a>(error: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static) {
    let mut current = error;
    while let Some(next) = current.source() {
        current = next;
    }
    current
}

fn should_log_attempt(attempt: u32) -> bool {
    attempt <= 5 || attempt % 10 == 0
}

/// Resolution of one slave registration.
pub struct SchemaResolver {
    device: DeviceId,
    source_ids: Vec<SourceIdentifier>,
    factory: Arc<dyn SchemaContextFactory>,
    classifier: Arc<dyn RetryClassifier>,
    retry_delay: Duration,
}

impl SchemaResolver {
    pub fn new(
        device: DeviceId,
        source_ids: Vec<SourceIdentifier>,
        factory: Arc<dyn SchemaContextFactory>,
        classifier: Arc<dyn RetryClassifier>,
        retry_delay: Duration,
    ) -> Self {
        Self { device, source_ids, factory, classifier, retry_delay }
    }

    /// Runs attempts until a context is built or the classifier says to abort.
    pub async fn resolve(&self) -> Result<SchemaContext, SchemaError> {
        let mut attempt: u32 = 1;
        loop {
            match self.factory.create_context(&self.source_ids).await {
                Ok(context) => {
                    info!(device = %self.device, attempt, "Schema context resolved");
                    return Ok(context);
                }
                Err(e) => match self.classifier.classify(&e) {
                    RetryDecision::Retry => {
                        if should_log_attempt(attempt) {
                            warn!(
                                device = %self.device,
                                attempt,
                                error = %e,
                                "Schema context resolution timed out, retrying"
                            );
                        }
                        attempt = attempt.saturating_add(1);
                        if self.retry_delay.is_zero() {
                            tokio::task::yield_now().await;
                        } else {
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                    RetryDecision::Abort => {
                        error!(device = %self.device, attempt, error = %e, "Schema context resolution failed");
                        return Err(e);
                    }
                },
            }
        }
    }
}
