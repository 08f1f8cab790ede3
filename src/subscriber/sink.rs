#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::TailError;

/// Delivery target of one subscriber.
///
/// The RPC layer adapts its remote callback to this trait. An `Err` means
/// the target can no longer accept lines; the subscriber is then detached
/// as if its connection had closed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LineSink: Send + Sync + 'static {
    async fn deliver(
        &self,
        line: String,
    ) -> Result<()>;
}

#[async_trait]
impl LineSink for mpsc::UnboundedSender<String> {
    async fn deliver(
        &self,
        line: String,
    ) -> Result<()> {
        self.send(line)
            .map_err(|_| TailError::SinkDelivery("line receiver dropped".into()).into())
    }
}

#[async_trait]
impl LineSink for mpsc::Sender<String> {
    async fn deliver(
        &self,
        line: String,
    ) -> Result<()> {
        self.send(line)
            .await
            .map_err(|_| TailError::SinkDelivery("line receiver dropped".into()).into())
    }
}

/// Adapts a plain callback into a [`LineSink`].
pub struct FnSink<F>(pub F);

#[async_trait]
impl<F> LineSink for FnSink<F>
where
    F: Fn(String) -> Result<()> + Send + Sync + 'static,
{
    async fn deliver(
        &self,
        line: String,
    ) -> Result<()> {
        (self.0)(line)
    }
}
