//! In-process tools

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tokio::task::{JoinError, JoinHandle};

use super::invoker::{ToolError, ToolInvoker};
use crate::types::{empty_object_schema, ToolArguments, ToolDescriptor, ToolSource};

type AsyncHandler =
    Arc<dyn Fn(ToolArguments) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;
type BlockingHandler = Arc<dyn Fn(ToolArguments) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Async(AsyncHandler),
    Blocking(BlockingHandler),
}

/// A tool implemented in the host process
///
/// Handlers run on their own task (async) or on the blocking pool (sync), so
/// a panic is reported as [`ToolError::Panicked`] instead of unwinding into
/// the caller.
///
/// Dropping an in-flight `invoke` (a caller timeout, for one) aborts an async
/// handler. A blocking handler cannot be interrupted and runs to completion.
#[derive(Clone)]
pub struct LocalTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Handler,
}

impl LocalTool {
    /// Create a tool with an async handler
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: empty_object_schema(),
            handler: Handler::Async(Arc::new(move |args| handler(args).boxed())),
        }
    }

    /// Create a tool whose handler blocks (file or process work)
    pub fn blocking<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolArguments) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: empty_object_schema(),
            handler: Handler::Blocking(Arc::new(handler)),
        }
    }

    /// Set the JSON Schema of the arguments
    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = schema;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            self.name.clone(),
            self.description.clone(),
            self.parameters.clone(),
            ToolSource::local(),
        )
    }
}

#[async_trait]
impl ToolInvoker for LocalTool {
    async fn invoke(&self, arguments: ToolArguments) -> Result<Value, ToolError> {
        let joined = match &self.handler {
            Handler::Async(handler) => {
                let handler = Arc::clone(handler);
                AbortOnDrop(tokio::spawn(async move { handler(arguments).await })).await
            }
            Handler::Blocking(handler) => {
                let handler = Arc::clone(handler);
                tokio::task::spawn_blocking(move || handler(arguments)).await
            }
        };

        match joined {
            Ok(result) => result.map_err(ToolError::Failed),
            Err(e) if e.is_panic() => Err(ToolError::Panicked(panic_message(e.into_panic()))),
            Err(e) => Err(ToolError::Failed(e.to_string())),
        }
    }
}

/// Aborts the task when dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
