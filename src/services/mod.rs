// Service exports
pub mod chat;
pub mod notifier;
pub mod ports;
pub mod postgres;
pub mod retry;

pub use chat::{ChatClient, ChatError};
pub use notifier::{MailNotifier, NotifyError};
pub use ports::{
    ChannelProvisioner, ContactDirectory, GroupRecord, GroupRepository, HealthProbe, Notifier,
    PreferenceQueue, ServiceError,
};
pub use postgres::{PostgresClient, PostgresError};
pub use retry::{with_retry, Retried, RetryConfig};
