pub mod backend;
pub mod guild;
pub mod noop;
pub mod router;
pub mod slack;

pub use backend::NotifyBackend;
pub use guild::{ChannelPoster, GuildBroadcast, WebhookPoster};
pub use noop::NoopBackend;
pub use router::NotifyRouter;
pub use slack::SlackWebhook;
