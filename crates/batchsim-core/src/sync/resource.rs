//! Resource with a limited number of interchangeable slots.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Resource with `capacity` interchangeable slots and a FIFO wait list.
///
/// [`Resource::acquire`] grants a slot immediately if one is free and nobody is waiting,
/// otherwise suspends the caller. A slot is released by dropping the returned [`ResourceGuard`];
/// the released slot is passed at the same instant to the oldest waiter, if any.
pub struct Resource {
    capacity: usize,
    state: RefCell<ResourceState>,
}

struct ResourceState {
    in_use: usize,
    waiters: VecDeque<Rc<RefCell<Request>>>,
}

struct Request {
    granted: bool,
    waker: Option<Waker>,
}

impl Resource {
    /// Creates a resource with the given number of slots.
    ///
    /// Panics if `capacity` is zero, since nobody could ever acquire such resource.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Resource capacity must be positive");
        Self {
            capacity,
            state: RefCell::new(ResourceState {
                in_use: 0,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Returns a future resolving to a guard holding one slot of the resource.
    pub fn acquire(&self) -> Acquire<'_> {
        Acquire {
            resource: self,
            request: None,
        }
    }

    /// Returns the total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of currently held slots.
    pub fn in_use(&self) -> usize {
        self.state.borrow().in_use
    }

    /// Returns the number of processes waiting for a slot.
    pub fn queue_len(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    fn release(&self) {
        let next = {
            let mut state = self.state.borrow_mut();
            let next = state.waiters.pop_front();
            if next.is_none() {
                state.in_use -= 1;
            }
            next
        };
        // the slot goes to the next waiter without becoming free
        if let Some(request) = next {
            let waker = {
                let mut request = request.borrow_mut();
                request.granted = true;
                request.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("capacity", &self.capacity)
            .field("in_use", &self.in_use())
            .field("waiting", &self.queue_len())
            .finish()
    }
}

/// Future returned by [`Resource::acquire`].
pub struct Acquire<'a> {
    resource: &'a Resource,
    request: Option<Rc<RefCell<Request>>>,
}

impl<'a> Future for Acquire<'a> {
    type Output = ResourceGuard<'a>;

    fn poll(mut self: Pin<&mut Self>, async_ctx: &mut Context) -> Poll<Self::Output> {
        let resource = self.resource;
        if let Some(request) = self.request.clone() {
            let mut request = request.borrow_mut();
            if request.granted {
                drop(request);
                self.request = None;
                return Poll::Ready(ResourceGuard { resource });
            }
            request.waker = Some(async_ctx.waker().clone());
            return Poll::Pending;
        }

        let mut state = resource.state.borrow_mut();
        if state.in_use < resource.capacity && state.waiters.is_empty() {
            state.in_use += 1;
            return Poll::Ready(ResourceGuard { resource });
        }
        let request = Rc::new(RefCell::new(Request {
            granted: false,
            waker: Some(async_ctx.waker().clone()),
        }));
        state.waiters.push_back(request.clone());
        drop(state);
        self.request = Some(request);
        Poll::Pending
    }
}

impl<'a> Drop for Acquire<'a> {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            let granted = request.borrow().granted;
            if granted {
                self.resource.release();
            } else {
                self.resource
                    .state
                    .borrow_mut()
                    .waiters
                    .retain(|r| !Rc::ptr_eq(r, &request));
            }
        }
    }
}

/// A held slot of a [`Resource`], released on drop.
pub struct ResourceGuard<'a> {
    resource: &'a Resource,
}

impl<'a> ResourceGuard<'a> {
    /// Returns the resource this slot belongs to.
    pub fn resource(&self) -> &'a Resource {
        self.resource
    }
}

impl<'a> Drop for ResourceGuard<'a> {
    fn drop(&mut self) {
        self.resource.release();
    }
}
