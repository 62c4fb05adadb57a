//! Agent operation port - the opaque callable under protection or test.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

use crate::domain::errors::OperationError;

/// An asynchronous agent call taking one input value.
///
/// In production these wrap prompt-driven model calls; this layer treats them as opaque.
/// Implementations should be idempotent or cheap to abandon, since timeouts drop the
/// in-flight future.
#[async_trait]
pub trait AgentOperation: Send + Sync {
    async fn invoke(&self, input: Value) -> Result<Value, OperationError>;
}

/// Adapter turning an async closure into an [`AgentOperation`].
pub struct FnOperation<F>(F);

impl<F> FnOperation<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> AgentOperation for FnOperation<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, OperationError>> + Send,
{
    async fn invoke(&self, input: Value) -> Result<Value, OperationError> {
        (self.0)(input).await
    }
}
