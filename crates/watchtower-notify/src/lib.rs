pub mod dispatcher;
pub mod message;
pub mod notifier;
pub mod providers;
pub mod queue;

pub use dispatcher::{ChannelDelivery, Dispatcher, DrainReport};
pub use message::{NotificationTask, NotifyChannel, Priority, TaskKind};
pub use notifier::{Notifier, NotifyError, NotifyResult};
pub use providers::{
    build_notifiers, ChannelsConfig, EmailConfig, EmailNotifier, SlackConfig, SlackNotifier, SmsConfig,
    SmsNotifier, WebhookConfig, WebhookNotifier,
};
pub use queue::{ChannelFailure, DeadLetter, NotificationQueue, RetryOutcome};
