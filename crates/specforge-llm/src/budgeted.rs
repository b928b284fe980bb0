//! Call-count budget around any generator

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use specforge_utils::error::LlmError;

use crate::types::{Completion, CompletionRequest, TextGenerator};

/// Wraps a generator and refuses calls once `limit` attempts have been made.
///
/// The budget counts attempted calls, not successful ones, so a failing
/// provider still consumes its slot.
pub struct BudgetedGenerator {
    inner: Arc<dyn TextGenerator>,
    used: AtomicU32,
    limit: u32,
}

impl BudgetedGenerator {
    #[must_use]
    pub fn new(inner: Arc<dyn TextGenerator>, limit: u32) -> Self {
        debug!(limit, provider = inner.name(), "Creating BudgetedGenerator");
        Self {
            inner,
            used: AtomicU32::new(0),
            limit,
        }
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }
}

#[async_trait]
impl TextGenerator for BudgetedGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_completion(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        // Count before calling so retries cannot slip past the cap.
        let current = self.used.fetch_add(1, Ordering::SeqCst);
        if current >= self.limit {
            let attempted = current.saturating_add(1);
            warn!(limit = self.limit, attempted, "Text-generation budget exhausted");
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted,
            });
        }

        let result = self.inner.generate_completion(request).await;
        if let Err(e) = &result {
            debug!(
                call_count = current + 1,
                limit = self.limit,
                error = %e,
                "Inner generator failed (budget slot still consumed)"
            );
        }
        result
    }
}
