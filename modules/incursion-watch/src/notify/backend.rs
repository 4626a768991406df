use async_trait::async_trait;

/// Outbound delivery of a finished notification message.
#[async_trait]
pub trait NotifyBackend: Send + Sync {
    async fn send(&self, message: &str) -> anyhow::Result<()>;
}
