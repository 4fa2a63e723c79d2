use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

// Single-threaded FIFO channel connecting woken tasks with the executor.
//
// Every message is stamped with the next value of a sequence shared with timers,
// so that wake-ups and timers due at the same time can be processed in registration order.

pub(crate) type EventId = u64;

#[derive(Clone)]
pub(crate) struct Receiver<T> {
    data: Rc<RefCell<VecDeque<(EventId, T)>>>,
}

impl<T> Receiver<T> {
    pub fn try_recv(&self) -> Option<(EventId, T)> {
        self.data.borrow_mut().pop_front()
    }

    pub fn next_id(&self) -> Option<EventId> {
        self.data.borrow().front().map(|(id, _)| *id)
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }
}

#[derive(Clone)]
pub(crate) struct Sender<T> {
    data: Rc<RefCell<VecDeque<(EventId, T)>>>,
    sequence: Rc<Cell<EventId>>,
}

impl<T> Sender<T> {
    pub fn send(&self, value: T) {
        let id = self.next_event_id();
        self.data.borrow_mut().push_back((id, value));
    }

    // Reserves a position in the processing order, used for timers.
    pub fn next_event_id(&self) -> EventId {
        let id = self.sequence.get();
        self.sequence.set(id + 1);
        id
    }
}

pub(crate) fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let data = Rc::new(RefCell::new(VecDeque::new()));
    (
        Sender {
            data: data.clone(),
            sequence: Rc::new(Cell::new(0)),
        },
        Receiver { data },
    )
}
