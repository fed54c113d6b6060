use std::future::Future;

use tracing::Instrument;
use ulid::Ulid;

/// A correlation id bound to one logical invocation, carried explicitly on
/// every function that may log or touch the Store rather than through
/// ambient thread-local state (spec.md §9 redesign flag: "implicit
/// asynchronous context").
#[derive(Debug, Clone)]
pub struct CorrelationContext {
    pub correlation_id: String,
    pub parent_span_id: Option<String>,
}

impl CorrelationContext {
    pub fn root() -> Self {
        Self { correlation_id: Ulid::new().to_string(), parent_span_id: None }
    }

    /// A child context for a nested unit of work (e.g. one job handler
    /// invoked from within a worker's claim loop); its own id is fresh but
    /// its parent points back to `self`.
    pub fn child(&self) -> Self {
        Self { correlation_id: Ulid::new().to_string(), parent_span_id: Some(self.correlation_id.clone()) }
    }
}

/// Generates a root correlation context, enters a tracing span carrying
/// it, and runs `f` with that context passed explicitly. Call once at the
/// hook entry point and once per worker `claim` (spec.md §4.4, §4.6).
pub async fn with_correlation<F, Fut, T>(f: F) -> T
where
    F: FnOnce(CorrelationContext) -> Fut,
    Fut: Future<Output = T>,
{
    let ctx = CorrelationContext::root();
    let span = tracing::info_span!("correlated", correlation_id = %ctx.correlation_id);
    f(ctx).instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_context_points_back_to_parent() {
        let root = CorrelationContext::root();
        let child = root.child();
        assert_eq!(child.parent_span_id.as_deref(), Some(root.correlation_id.as_str()));
        assert_ne!(child.correlation_id, root.correlation_id);
    }

    #[tokio::test]
    async fn with_correlation_generates_a_fresh_id_per_call() {
        let id1 = with_correlation(|ctx| async move { ctx.correlation_id }).await;
        let id2 = with_correlation(|ctx| async move { ctx.correlation_id }).await;
        assert_ne!(id1, id2);
    }
}
