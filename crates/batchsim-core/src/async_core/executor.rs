use std::rc::Rc;

use super::channel::{EventId, Receiver};
use super::task::Task;

// Polls tasks from the ready queue one at a time.
pub(crate) struct Executor {
    ready_queue: Receiver<Rc<Task>>,
}

impl Executor {
    pub fn new(ready_queue: Receiver<Rc<Task>>) -> Self {
        Self { ready_queue }
    }

    // Returns false if there was no ready task.
    pub fn process_task(&self) -> bool {
        match self.ready_queue.try_recv() {
            Some((_, task)) => {
                // a wake-up received during the final poll is stale
                if !task.is_finished() {
                    task.poll();
                }
                true
            }
            None => false,
        }
    }

    pub fn next_ready_id(&self) -> Option<EventId> {
        self.ready_queue.next_id()
    }

    pub fn has_ready_tasks(&self) -> bool {
        !self.ready_queue.is_empty()
    }
}
