use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::backend::NotifyBackend;
use super::guild::GuildBroadcast;
use super::noop::NoopBackend;
use super::slack::SlackWebhook;
use crate::store::KvStore;

/// Fans a message out to every configured backend. Failures are logged per
/// backend and never returned to the caller.
pub struct NotifyRouter {
    backends: Vec<(&'static str, Box<dyn NotifyBackend>)>,
}

impl NotifyRouter {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    pub fn with_backend(mut self, label: &'static str, backend: Box<dyn NotifyBackend>) -> Self {
        self.backends.push((label, backend));
        self
    }

    /// Guild channels when a durable store holds the registry, Slack when a
    /// webhook URL is configured, otherwise a logging no-op.
    pub fn build(slack_webhook_url: Option<String>, guild_store: Option<Arc<dyn KvStore>>) -> Self {
        let mut router = Self::new();

        if let Some(store) = guild_store {
            router = router.with_backend("guilds", Box::new(GuildBroadcast::new(store)));
        }

        match slack_webhook_url {
            Some(url) => {
                info!("Slack notifications enabled");
                router = router.with_backend("slack", Box::new(SlackWebhook::new(url)));
            }
            None => info!("No SLACK_WEBHOOK_URL set, Slack notifications disabled"),
        }

        if router.is_empty() {
            router = router.with_backend("noop", Box::new(NoopBackend));
        }
        router
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[async_trait]
impl NotifyBackend for NotifyRouter {
    async fn send(&self, message: &str) -> anyhow::Result<()> {
        for (label, backend) in &self.backends {
            if let Err(e) = backend.send(message).await {
                warn!(backend = label, error = %e, "Failed to send notification");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl NotifyBackend for Recording {
        async fn send(&self, message: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl NotifyBackend for Failing {
        async fn send(&self, _message: &str) -> anyhow::Result<()> {
            anyhow::bail!("channel offline")
        }
    }

    #[tokio::test]
    async fn failing_backend_does_not_block_the_rest() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let router = NotifyRouter::new()
            .with_backend("failing", Box::new(Failing))
            .with_backend("recording", Box::new(Recording(sent.clone())));

        router.send("Incursion in X-7OMU Despawned").await.unwrap();
        assert_eq!(*sent.lock().unwrap(), vec!["Incursion in X-7OMU Despawned"]);
    }

    #[test]
    fn build_without_channels_falls_back_to_noop() {
        let router = NotifyRouter::build(None, None);
        assert_eq!(router.len(), 1);
        assert_eq!(router.backends[0].0, "noop");
    }
}
