use async_trait::async_trait;
use tracing::info;

use super::backend::NotifyBackend;

/// Backend used when no channel is configured. Logs instead of delivering.
pub struct NoopBackend;

#[async_trait]
impl NotifyBackend for NoopBackend {
    async fn send(&self, message: &str) -> anyhow::Result<()> {
        info!(chars = message.len(), "No notification channel configured, dropping message");
        Ok(())
    }
}
