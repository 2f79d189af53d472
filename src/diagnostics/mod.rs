//! Optional echo of the raw provider stream to a diagnostic sink.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("diagnostic sink failure: {message}")]
pub struct DiagnosticError {
    pub message: String,
}

impl DiagnosticError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receives a copy of every raw provider chunk. Failures here never reach the
/// chat caller; the sink is detached after its first error.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn record(&self, index: usize, chunk: &str) -> Result<(), DiagnosticError>;

    async fn finish(&self, _chunks: usize) -> Result<(), DiagnosticError> {
        Ok(())
    }
}

/// Logs raw chunks through `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnosticSink;

#[async_trait]
impl DiagnosticSink for TracingDiagnosticSink {
    async fn record(&self, index: usize, chunk: &str) -> Result<(), DiagnosticError> {
        tracing::debug!(target: "azure_openai_runtime::debug_stream", index, chunk, "raw chat completion chunk");
        Ok(())
    }

    async fn finish(&self, chunks: usize) -> Result<(), DiagnosticError> {
        tracing::debug!(target: "azure_openai_runtime::debug_stream", chunks, "raw chat completion stream finished");
        Ok(())
    }
}

/// Duplicates the raw chunks of `primary` into `sink` on a separate task.
///
/// The copy goes through an unbounded channel, so the primary stream never
/// waits on the sink. Must be called inside a tokio runtime.
pub fn tee<T, F>(
    primary: BoxStream<'static, T>,
    sink: Arc<dyn DiagnosticSink>,
    raw_chunk: F,
) -> BoxStream<'static, T>
where
    T: Send + 'static,
    F: Fn(&T) -> Option<String> + Send + 'static,
{
    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let mut index = 0;
        while let Some(chunk) = receiver.recv().await {
            if let Err(error) = sink.record(index, &chunk).await {
                tracing::warn!(%error, index, "diagnostic sink failed; detaching");
                return;
            }
            index += 1;
        }

        if let Err(error) = sink.finish(index).await {
            tracing::warn!(%error, chunks = index, "diagnostic sink failed to finish");
        }
    });

    primary
        .inspect(move |item| {
            if let Some(chunk) = raw_chunk(item) {
                // A detached sink has dropped its receiver.
                let _ = sender.send(chunk);
            }
        })
        .boxed()
}
