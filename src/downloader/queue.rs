//! FIFO queue of accepted tasks.

use crate::types::TaskId;

use super::{LiteDownloader, QueuedTask};

impl LiteDownloader {
    /// Append a task to the queue and wake the queue processor
    pub(crate) async fn enqueue(&self, task: QueuedTask) {
        {
            let mut queue = self.queue_state.queue.lock().await;
            queue.push_back(task);
        }
        self.queue_state.queue_notify.notify_one();
    }

    /// Take the oldest queued task, if any
    pub(crate) async fn dequeue(&self) -> Option<QueuedTask> {
        let mut queue = self.queue_state.queue.lock().await;
        queue.pop_front()
    }

    /// Remove a task from the queue without starting it
    ///
    /// Returns true if the task was still waiting and has been removed.
    pub(crate) async fn remove_from_queue(&self, task_id: &TaskId) -> bool {
        let mut queue = self.queue_state.queue.lock().await;
        let original_len = queue.len();
        queue.retain(|item| &item.task_id != task_id);
        queue.len() < original_len
    }

    /// Empty the queue, returning the ids that were waiting (oldest first)
    pub(crate) async fn drain_queue(&self) -> Vec<TaskId> {
        let mut queue = self.queue_state.queue.lock().await;
        queue.drain(..).map(|item| item.task_id).collect()
    }

    /// Number of tasks waiting for a worker slot
    pub async fn queued_count(&self) -> usize {
        self.queue_state.queue.lock().await.len()
    }
}
