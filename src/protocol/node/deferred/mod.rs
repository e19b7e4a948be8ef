//! Work requested from interrupt context and carried out by the main loop.
//!
//! Interrupt handlers (a wire being cut, the timer hitting zero, ...) must not
//! touch the bus themselves: they may fire in the middle of a transmission or
//! while the link state is half updated. Instead they raise a flag in a
//! [`DeferredTasks`] set, and the engine acts on it at the end of its next
//! full poll. Raising an already raised flag is a no-op, so a burst of
//! requests for the same task collapses into one action.
use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

//==================================================================================TASK
/// Actions an interrupt handler can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Task {
    /// Report a strike to the master.
    Strike = 0x01,
    /// Report the module as solved and enter [`Mode::Disarmed`](crate::protocol::messages::Mode::Disarmed).
    Disarmed = 0x02,
    /// Node specific status read, handled by the node's task hook.
    ReadStatus = 0x04,
    /// Answer the pending REQUEST_ID.
    SendId = 0x08,
    /// Node specific time broadcast, handled by the node's task hook.
    SendTime = 0x10,
}

impl Task {
    /// All tasks in drain order.
    pub const ALL: [Task; 5] = [
        Task::Strike,
        Task::Disarmed,
        Task::ReadStatus,
        Task::SendId,
        Task::SendTime,
    ];

    #[inline]
    pub const fn bit(self) -> u8 {
        self as u8
    }

    /// Tasks that go through the queued-packet slot and have to wait for it.
    pub const fn needs_slot(self) -> bool {
        matches!(self, Task::Strike | Task::Disarmed)
    }
}

//==================================================================================TASK_SET
/// Snapshot of pending tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskSet(u8);

impl TaskSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, task: Task) -> bool {
        self.0 & task.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, task: Task) {
        self.0 |= task.bit();
    }

    /// Pending tasks in drain order.
    pub fn iter(self) -> impl Iterator<Item = Task> {
        Task::ALL.into_iter().filter(move |task| self.contains(*task))
    }
}

impl FromIterator<Task> for TaskSet {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut set = TaskSet::empty();
        for task in iter {
            set.insert(task);
        }
        set
    }
}

//==================================================================================DEFERRED_TASKS
/// Flag set shared between interrupt handlers and the main loop.
///
/// Usually placed in a `static` so that interrupt handlers can reach it; the
/// engine only borrows it.
pub struct DeferredTasks {
    flags: Mutex<CriticalSectionRawMutex, Cell<u8>>,
}

impl Default for DeferredTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredTasks {
    pub const fn new() -> Self {
        Self {
            flags: Mutex::new(Cell::new(0)),
        }
    }

    /// Raise `task`. Safe to call from an interrupt handler.
    pub fn request(&self, task: Task) {
        self.flags.lock(|flags| flags.set(flags.get() | task.bit()));
    }

    /// Tasks currently raised.
    pub fn pending(&self) -> TaskSet {
        TaskSet(self.flags.lock(Cell::get))
    }

    pub fn is_pending(&self, task: Task) -> bool {
        self.pending().contains(task)
    }

    /// Clear `task` and report whether it was raised, in one critical
    /// section. A request made after this returns is kept for the next drain.
    pub fn take(&self, task: Task) -> bool {
        self.flags.lock(|flags| {
            let bits = flags.get();
            flags.set(bits & !task.bit());
            bits & task.bit() != 0
        })
    }
}
