use std::cell::{Cell, RefCell};
use std::future::Future;
use std::mem::ManuallyDrop;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, RawWaker, RawWakerVTable, Waker};

use futures::task::WakerRef;

use super::channel::Sender;

type BoxedFuture = Pin<Box<dyn Future<Output = ()>>>;

// A simulation process spawned via Simulation::spawn or SimulationContext::spawn.
// Holds the process future and puts itself into the executor ready queue on wake-up notifications.
pub(crate) struct Task {
    future: RefCell<Option<BoxedFuture>>,
    scheduled: Cell<bool>,
    executor: Sender<Rc<Task>>,
}

impl Task {
    fn new(future: impl Future<Output = ()> + 'static, executor: Sender<Rc<Task>>) -> Self {
        Self {
            future: RefCell::new(Some(Box::pin(future))),
            scheduled: Cell::new(false),
            executor,
        }
    }

    // Converts a future into a task and passes it to executor.
    pub fn spawn(future: impl Future<Output = ()> + 'static, executor: Sender<Rc<Task>>) {
        let task = Rc::new(Task::new(future, executor));
        task.schedule();
    }

    // Polls the process future once.
    // Calling this method after the process completion results in panic.
    pub fn poll(self: Rc<Self>) {
        self.scheduled.set(false);
        let mut future_slot = self.future.borrow_mut();
        if let Some(mut future) = future_slot.take() {
            let waker = waker_ref(&self);
            let async_ctx = &mut Context::from_waker(&waker);
            if future.as_mut().poll(async_ctx).is_pending() {
                *future_slot = Some(future);
            }
        } else {
            panic!("Task is polled after completion")
        }
    }

    pub fn is_finished(&self) -> bool {
        self.future.borrow().is_none()
    }

    // A task is queued at most once between two polls.
    fn schedule(self: &Rc<Self>) {
        if !self.scheduled.replace(true) {
            self.executor.send(self.clone());
        }
    }

    fn wake_by_ref(rc_self: &Rc<Self>) {
        rc_self.schedule();
    }
}

// Waker ---------------------------------------------------------------------------------------------------------------

// std::task::Wake requires Arc, so the Rc-based waker vtable is built by hand.
// Based on waker-related code from the futures crate:
// https://github.com/rust-lang/futures-rs/tree/master/futures-task/src

// Borrows a waker from the task without touching its reference count.
fn waker_ref(task: &Rc<Task>) -> WakerRef<'_> {
    let ptr = Rc::as_ptr(task).cast::<()>();
    let waker = ManuallyDrop::new(unsafe { Waker::from_raw(RawWaker::new(ptr, &TASK_WAKER_VTABLE)) });
    WakerRef::new_unowned(waker)
}

static TASK_WAKER_VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

unsafe fn clone_raw(data: *const ()) -> RawWaker {
    let task = ManuallyDrop::new(unsafe { Rc::from_raw(data.cast::<Task>()) });
    // the clone is leaked into the new waker
    let _: ManuallyDrop<Rc<Task>> = task.clone();
    RawWaker::new(data, &TASK_WAKER_VTABLE)
}

unsafe fn wake_raw(data: *const ()) {
    let task = unsafe { Rc::from_raw(data.cast::<Task>()) };
    Task::wake_by_ref(&task);
}

unsafe fn wake_by_ref_raw(data: *const ()) {
    let task = ManuallyDrop::new(unsafe { Rc::from_raw(data.cast::<Task>()) });
    Task::wake_by_ref(&task);
}

unsafe fn drop_raw(data: *const ()) {
    drop(unsafe { Rc::from_raw(data.cast::<Task>()) })
}
