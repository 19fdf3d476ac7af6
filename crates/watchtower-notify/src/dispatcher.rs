use crate::message::{NotificationTask, NotifyChannel};
use crate::notifier::Notifier;
use crate::queue::{ChannelFailure, DeadLetter, NotificationQueue, RetryOutcome};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// 单个渠道的投递结果
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDelivery {
    pub channel: NotifyChannel,
    pub success: bool,
    pub message: String,
}

/// 一次出队处理的结果
#[derive(Debug, Default)]
pub struct DrainReport {
    pub processed: usize,
    pub delivered: usize,
    pub retried: usize,
    pub dead_letters: Vec<DeadLetter>,
    pub deliveries: Vec<ChannelDelivery>,
    pub remaining: usize,
}

/// 通知分发器：把任务扇出到所有启用的渠道
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn channels(&self) -> Vec<NotifyChannel> {
        self.notifiers
            .iter()
            .filter(|n| n.is_enabled())
            .map(|n| n.channel())
            .collect()
    }

    /// 把任务发送到目标渠道，每个渠道互不影响
    pub async fn deliver(&self, task: &NotificationTask) -> Vec<ChannelDelivery> {
        let mut deliveries = Vec::new();

        for notifier in self.notifiers.iter().filter(|n| n.is_enabled()) {
            let channel = notifier.channel();
            if !task.targets(channel) {
                continue;
            }

            let delivery = match notifier.send(task).await {
                Ok(result) => {
                    if result.success {
                        info!(task_id = %task.id, channel = %channel, "Notification sent");
                    } else {
                        warn!(task_id = %task.id, channel = %channel, reason = %result.message, "Notification failed");
                    }
                    ChannelDelivery {
                        channel,
                        success: result.success,
                        message: result.message,
                    }
                }
                Err(e) => {
                    warn!(task_id = %task.id, channel = %channel, error = %e, "Notification error");
                    ChannelDelivery {
                        channel,
                        success: false,
                        message: e.to_string(),
                    }
                }
            };
            deliveries.push(delivery);
        }

        if deliveries.is_empty() {
            debug!(task_id = %task.id, "No channel targeted by notification");
        }

        deliveries
    }

    /// 出队一批任务并投递
    ///
    /// 只在出队和回写时持有队列锁，发送期间不持锁。
    pub async fn drain(&self, queue: &Mutex<NotificationQueue>, batch_size: usize) -> DrainReport {
        let batch = queue.lock().await.take_batch(batch_size);
        let mut report = DrainReport {
            processed: batch.len(),
            ..Default::default()
        };

        let mut failed = Vec::new();
        for task in batch {
            let deliveries = self.deliver(&task).await;
            let failures: Vec<ChannelFailure> = deliveries
                .iter()
                .filter(|d| !d.success)
                .map(|d| ChannelFailure {
                    channel: d.channel,
                    message: d.message.clone(),
                })
                .collect();

            report.deliveries.extend(deliveries);
            if failures.is_empty() {
                report.delivered += 1;
            } else {
                failed.push((task, failures));
            }
        }

        let mut queue = queue.lock().await;
        let now = Utc::now();
        for (task, failures) in failed {
            match queue.handle_failure(task, failures, now) {
                RetryOutcome::Requeued(_) => report.retried += 1,
                RetryOutcome::DeadLetter(dead) => {
                    error!(
                        task_id = %dead.task.id,
                        kind = %dead.task.kind.as_str(),
                        retry_count = dead.task.retry_count,
                        "Notification dropped as dead letter"
                    );
                    report.dead_letters.push(dead);
                }
            }
        }
        report.remaining = queue.len();

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Priority, TaskKind};
    use crate::notifier::{NotifyError, NotifyResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    struct RecordingNotifier {
        channel: NotifyChannel,
        fail: bool,
        sent: StdMutex<Vec<NotificationTask>>,
    }

    impl RecordingNotifier {
        fn new(channel: NotifyChannel, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                channel,
                fail,
                sent: StdMutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<NotificationTask> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, task: &NotificationTask) -> Result<NotifyResult, NotifyError> {
            self.sent.lock().unwrap().push(task.clone());
            if self.fail {
                Ok(NotifyResult::failure("channel down"))
            } else {
                Ok(NotifyResult::success())
            }
        }

        fn channel(&self) -> NotifyChannel {
            self.channel
        }
    }

    #[tokio::test]
    async fn test_drain_delivers_by_priority() {
        let slack = RecordingNotifier::new(NotifyChannel::Slack, false);
        let dispatcher = Dispatcher::new(vec![slack.clone() as Arc<dyn Notifier>]);
        let queue = Mutex::new(NotificationQueue::default());

        {
            let mut q = queue.lock().await;
            for priority in [Priority::Low, Priority::Normal, Priority::High] {
                for _ in 0..5 {
                    q.enqueue(NotificationTask::new(TaskKind::Alert, priority, json!({})));
                }
            }
        }

        let report = dispatcher.drain(&queue, 10).await;
        assert_eq!(report.processed, 10);
        assert_eq!(report.delivered, 10);
        assert_eq!(report.remaining, 5);

        let sent = slack.sent();
        assert!(sent[..5].iter().all(|t| t.priority == Priority::High));
        assert!(sent[5..].iter().all(|t| t.priority == Priority::Normal));

        let report = dispatcher.drain(&queue, 10).await;
        assert_eq!(report.delivered, 5);
        assert!(slack.sent()[10..].iter().all(|t| t.priority == Priority::Low));
    }

    #[tokio::test]
    async fn test_retry_targets_only_failed_channels() {
        let slack = RecordingNotifier::new(NotifyChannel::Slack, false);
        let email = RecordingNotifier::new(NotifyChannel::Email, true);
        let dispatcher = Dispatcher::new(vec![slack.clone() as Arc<dyn Notifier>, email.clone() as Arc<dyn Notifier>]);
        let queue = Mutex::new(NotificationQueue::default());

        queue
            .lock()
            .await
            .enqueue(NotificationTask::new(TaskKind::Emergency, Priority::High, json!({})));

        let report = dispatcher.drain(&queue, 10).await;
        assert_eq!(report.retried, 1);
        assert_eq!(report.remaining, 1);

        let report = dispatcher.drain(&queue, 10).await;
        assert_eq!(report.retried, 1);

        let report = dispatcher.drain(&queue, 10).await;
        assert_eq!(report.dead_letters.len(), 1);
        assert_eq!(report.remaining, 0);

        // slack 只在第一次投递
        assert_eq!(slack.sent().len(), 1);
        assert_eq!(email.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_normal_task_is_dead_letter() {
        let webhook = RecordingNotifier::new(NotifyChannel::Webhook, true);
        let dispatcher = Dispatcher::new(vec![webhook as Arc<dyn Notifier>]);
        let queue = Mutex::new(NotificationQueue::default());

        queue
            .lock()
            .await
            .enqueue(NotificationTask::new(TaskKind::Alert, Priority::Normal, json!({})));

        let report = dispatcher.drain(&queue, 10).await;
        assert_eq!(report.dead_letters.len(), 1);
        assert_eq!(report.dead_letters[0].failures[0].message, "channel down");
        assert_eq!(report.remaining, 0);
    }

    #[tokio::test]
    async fn test_no_channels_drains_queue() {
        let dispatcher = Dispatcher::new(Vec::new());
        let queue = Mutex::new(NotificationQueue::default());
        queue
            .lock()
            .await
            .enqueue(NotificationTask::new(TaskKind::Alert, Priority::High, json!({})));

        let report = dispatcher.drain(&queue, 10).await;
        assert_eq!(report.delivered, 1);
        assert!(dispatcher.channels().is_empty());
    }
}
