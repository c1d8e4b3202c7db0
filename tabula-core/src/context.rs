use crate::{DbError, Result, TableId};
use std::{future::Future, time::Duration};
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;

/// Request scoped hints telling the decoder which row representation to build.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeHint {
    pub table: Option<TableId>,
    pub read_only: bool,
    pub stored: bool,
}

/// Deadline, cancellation and decode hints travelling with every database call.
#[derive(Default, Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
    hint: DecodeHint,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_hint(mut self, hint: DecodeHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn hint(&self) -> DecodeHint {
        self.hint
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `future` bounded by the earlier of the context deadline and `now + timeout`, aborting it on cancellation.
    pub async fn run<T, F>(&self, timeout: Duration, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(DbError::Cancelled(operation.to_string()).into());
        }
        let local = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(deadline) if deadline < local => deadline,
            _ => local,
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DbError::Cancelled(operation.to_string()).into()),
            result = timeout_at(deadline, future) => match result {
                Ok(result) => result,
                Err(..) => Err(DbError::DeadlineExceeded(operation.to_string()).into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_kind;

    #[tokio::test]
    async fn completes_in_time() {
        let ctx = CallContext::new();
        let value = ctx
            .run(Duration::from_secs(1), "ping", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn context_deadline_wins() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(10));
        let error = ctx
            .run(Duration::from_secs(60), "query", async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(
            error_kind(&error),
            Some(DbError::DeadlineExceeded(op)) if op == "query"
        ));
    }

    #[tokio::test]
    async fn cancelled() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());
        token.cancel();
        let error = ctx
            .run(Duration::from_secs(1), "prepare", async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(error_kind(&error), Some(DbError::Cancelled(..))));
    }
}
