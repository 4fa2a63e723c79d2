//! Unbounded FIFO queue with blocking gets.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Unbounded multi-producer multi-consumer FIFO queue.
///
/// [`Store::put`] never blocks. [`Store::get`] returns the oldest item or suspends the caller until
/// an item is available. Suspended getters are served in the order they started waiting, and an item
/// put while somebody is waiting is handed over to the oldest getter directly, so it never becomes
/// visible in the queue.
///
/// Besides the blocking interface the queue supports inspection and order-preserving removal of items,
/// which allows a scheduler to take back work that was not picked up yet.
pub struct Store<T> {
    items: RefCell<VecDeque<T>>,
    getters: RefCell<VecDeque<Rc<RefCell<GetSlot<T>>>>>,
}

struct GetSlot<T> {
    item: Option<T>,
    waker: Option<Waker>,
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Store<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: RefCell::new(VecDeque::new()),
            getters: RefCell::new(VecDeque::new()),
        }
    }

    /// Appends an item to the queue or hands it over to the oldest waiting getter.
    pub fn put(&self, item: T) {
        let getter = self.getters.borrow_mut().pop_front();
        match getter {
            Some(slot) => Self::fill(&slot, item),
            None => self.items.borrow_mut().push_back(item),
        }
    }

    /// Returns a future resolving to the oldest item of the queue.
    ///
    /// Dropping the future before it resolves withdraws the request without losing items.
    pub fn get(&self) -> StoreGet<'_, T> {
        StoreGet { store: self, slot: None }
    }

    /// Returns the number of items waiting in the queue.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Returns `true` if there are no items in the queue.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Returns the number of processes waiting for an item.
    pub fn waiting_count(&self) -> usize {
        self.getters.borrow().len()
    }

    /// Removes all items matching the predicate and returns them in queue order.
    ///
    /// The relative order of the remaining items is preserved.
    pub fn remove_where<F>(&self, mut pred: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut items = self.items.borrow_mut();
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(items.len());
        for item in items.drain(..) {
            if pred(&item) {
                removed.push(item);
            } else {
                kept.push_back(item);
            }
        }
        *items = kept;
        removed
    }

    // Returns an item taken by a withdrawn getter back to the head of the queue.
    fn restore(&self, item: T) {
        let getter = self.getters.borrow_mut().pop_front();
        match getter {
            Some(slot) => Self::fill(&slot, item),
            None => self.items.borrow_mut().push_front(item),
        }
    }

    fn fill(slot: &Rc<RefCell<GetSlot<T>>>, item: T) {
        let waker = {
            let mut slot = slot.borrow_mut();
            slot.item = Some(item);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T: Clone> Store<T> {
    /// Returns a snapshot of the queued items in FIFO order.
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().iter().cloned().collect()
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.len())
            .field("waiting", &self.waiting_count())
            .finish()
    }
}

/// Future returned by [`Store::get`].
pub struct StoreGet<'a, T> {
    store: &'a Store<T>,
    slot: Option<Rc<RefCell<GetSlot<T>>>>,
}

impl<'a, T> Future for StoreGet<'a, T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, async_ctx: &mut Context) -> Poll<T> {
        if let Some(slot) = self.slot.clone() {
            let mut slot = slot.borrow_mut();
            return match slot.item.take() {
                Some(item) => {
                    drop(slot);
                    self.slot = None;
                    Poll::Ready(item)
                }
                None => {
                    slot.waker = Some(async_ctx.waker().clone());
                    Poll::Pending
                }
            };
        }

        let head = self.store.items.borrow_mut().pop_front();
        if let Some(item) = head {
            return Poll::Ready(item);
        }
        let slot = Rc::new(RefCell::new(GetSlot {
            item: None,
            waker: Some(async_ctx.waker().clone()),
        }));
        self.store.getters.borrow_mut().push_back(slot.clone());
        self.slot = Some(slot);
        Poll::Pending
    }
}

impl<'a, T> Drop for StoreGet<'a, T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.store.getters.borrow_mut().retain(|s| !Rc::ptr_eq(s, &slot));
            let item = slot.borrow_mut().item.take();
            if let Some(item) = item {
                self.store.restore(item);
            }
        }
    }
}
