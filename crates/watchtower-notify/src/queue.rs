use crate::message::{NotificationTask, NotifyChannel, Priority};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// 单个渠道的失败信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFailure {
    pub channel: NotifyChannel,
    pub message: String,
}

/// 重试耗尽或不可重试的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub task: NotificationTask,
    pub failures: Vec<ChannelFailure>,
    pub dropped_at: DateTime<Utc>,
}

/// 失败任务的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Requeued(NotificationTask),
    DeadLetter(DeadLetter),
}

/// 内存通知队列
///
/// 出队时按优先级降序稳定排序，同一优先级内不保证先进先出。
#[derive(Debug)]
pub struct NotificationQueue {
    tasks: VecDeque<NotificationTask>,
    max_retries: u32,
}

impl NotificationQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            tasks: VecDeque::new(),
            max_retries,
        }
    }

    pub fn enqueue(&mut self, task: NotificationTask) {
        debug!(task_id = %task.id, kind = %task.kind.as_str(), priority = %task.priority.as_str(), "Notification queued");
        self.tasks.push_back(task);
    }

    /// 放到队首，出队排序后仍位于同优先级的最前面
    pub fn enqueue_front(&mut self, task: NotificationTask) {
        debug!(task_id = %task.id, kind = %task.kind.as_str(), "Notification queued at front");
        self.tasks.push_front(task);
    }

    /// 取出最多 `batch_size` 个任务
    pub fn take_batch(&mut self, batch_size: usize) -> Vec<NotificationTask> {
        self.tasks
            .make_contiguous()
            .sort_by(|a, b| b.priority.cmp(&a.priority));

        let count = batch_size.min(self.tasks.len());
        self.tasks.drain(..count).collect()
    }

    /// 失败处理：原优先级为 high 的任务降级为 normal 并只重试失败的渠道
    pub fn handle_failure(
        &mut self,
        mut task: NotificationTask,
        failures: Vec<ChannelFailure>,
        now: DateTime<Utc>,
    ) -> RetryOutcome {
        if task.original_priority == Priority::High {
            task.retry_count += 1;
            task.priority = Priority::Normal;

            if task.retry_count < self.max_retries {
                task.channels = Some(failures.iter().map(|f| f.channel).collect());
                debug!(task_id = %task.id, retry_count = task.retry_count, "Notification requeued for retry");
                self.tasks.push_back(task.clone());
                return RetryOutcome::Requeued(task);
            }
        }

        RetryOutcome::DeadLetter(DeadLetter {
            task,
            failures,
            dropped_at: now,
        })
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotificationTask> {
        self.tasks.iter()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TaskKind;
    use serde_json::json;

    fn task(priority: Priority) -> NotificationTask {
        NotificationTask::new(TaskKind::Alert, priority, json!({}))
    }

    fn failure() -> Vec<ChannelFailure> {
        vec![ChannelFailure {
            channel: NotifyChannel::Slack,
            message: "Slack failed: 500".to_string(),
        }]
    }

    #[test]
    fn test_take_batch_by_priority() {
        let mut queue = NotificationQueue::default();
        for _ in 0..5 {
            queue.enqueue(task(Priority::Low));
            queue.enqueue(task(Priority::Normal));
            queue.enqueue(task(Priority::High));
        }

        let batch = queue.take_batch(10);
        assert_eq!(batch.len(), 10);
        assert!(batch[..5].iter().all(|t| t.priority == Priority::High));
        assert!(batch[5..].iter().all(|t| t.priority == Priority::Normal));
        assert_eq!(queue.len(), 5);
        assert!(queue.iter().all(|t| t.priority == Priority::Low));
    }

    #[test]
    fn test_enqueue_front_leads_its_tier() {
        let mut queue = NotificationQueue::default();
        queue.enqueue(task(Priority::High));
        queue.enqueue(task(Priority::Normal));

        let urgent = NotificationTask::new(TaskKind::Emergency, Priority::High, json!({}));
        let urgent_id = urgent.id.clone();
        queue.enqueue_front(urgent);

        let batch = queue.take_batch(1);
        assert_eq!(batch[0].id, urgent_id);
    }

    #[test]
    fn test_high_priority_failure_retries_then_dead_letters() {
        let mut queue = NotificationQueue::default();
        let mut current = task(Priority::High);
        let now = Utc::now();

        for expected_retry in 1..3 {
            match queue.handle_failure(current, failure(), now) {
                RetryOutcome::Requeued(t) => {
                    assert_eq!(t.retry_count, expected_retry);
                    assert_eq!(t.priority, Priority::Normal);
                    assert_eq!(t.original_priority, Priority::High);
                    assert_eq!(t.channels, Some(vec![NotifyChannel::Slack]));
                    current = queue.take_batch(1).remove(0);
                }
                RetryOutcome::DeadLetter(_) => panic!("retry {expected_retry} should requeue"),
            }
        }

        match queue.handle_failure(current, failure(), now) {
            RetryOutcome::DeadLetter(dead) => {
                assert_eq!(dead.task.retry_count, 3);
                assert_eq!(dead.failures.len(), 1);
            }
            RetryOutcome::Requeued(_) => panic!("third failure should dead-letter"),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_normal_and_low_failures_dead_letter_immediately() {
        let mut queue = NotificationQueue::default();
        let now = Utc::now();

        for priority in [Priority::Normal, Priority::Low] {
            let outcome = queue.handle_failure(task(priority), failure(), now);
            assert!(matches!(outcome, RetryOutcome::DeadLetter(ref d) if d.task.retry_count == 0));
        }
        assert!(queue.is_empty());
    }
}
