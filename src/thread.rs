use crate::context::Context;
use alloc::boxed::Box;
use alloc::vec;

pub type ThreadId = usize;

/// Id of the thread that called `init`.
pub const MAIN_THREAD: ThreadId = 0;

/// Termination is not a state: a terminated thread's control block is
/// dropped and its id goes back to the free pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Blocked,
}

/// Thread control block.
pub struct Thread {
    pub(crate) id: ThreadId,
    pub(crate) state: ThreadState,
    pub(crate) entry_point: Option<fn()>,
    pub(crate) context: Context,
    pub(crate) quantum_count: u64,
    pub(crate) sync_target: Option<ThreadId>,
    stack: Box<[u8]>,
}

impl Thread {
    /// Control block for the main thread. It is already running, on the
    /// stack it was started with, and its first quantum is under way.
    pub(crate) fn main() -> Box<Self> {
        Box::new(Thread {
            id: MAIN_THREAD,
            state: ThreadState::Running,
            entry_point: None,
            context: Context::empty(),
            quantum_count: 1,
            sync_target: None,
            stack: Box::new([]),
        })
    }

    /// Control block for a new thread that starts at `entry` the first time
    /// it is scheduled.
    pub(crate) fn spawn(id: ThreadId, entry: fn(), stack_size: usize) -> Box<Self> {
        let mut thread = Box::new(Thread {
            id,
            state: ThreadState::Ready,
            entry_point: Some(entry),
            context: Context::empty(),
            quantum_count: 0,
            sync_target: None,
            stack: vec![0u8; stack_size].into_boxed_slice(),
        });

        let Thread { context, stack, .. } = &mut *thread;
        // Both live inside the box and move with it, never out of it.
        unsafe { context.prepare(stack, entry) };
        thread
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn entry_point(&self) -> Option<fn()> {
        self.entry_point
    }

    pub fn quantum_count(&self) -> u64 {
        self.quantum_count
    }

    pub fn is_sync_blocked(&self) -> bool {
        self.sync_target.is_some()
    }

    /// Thread this one is waiting on, if it is sync-blocked.
    pub fn sync_target(&self) -> Option<ThreadId> {
        self.sync_target
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// Whether `addr` lies inside this thread's private stack.
    pub(crate) fn stack_contains(&self, addr: usize) -> bool {
        let range = self.stack.as_ptr_range();
        (range.start as usize..range.end as usize).contains(&addr)
    }

    pub(crate) fn mark_running(&mut self) {
        self.state = ThreadState::Running;
        self.quantum_count += 1;
    }
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("quantum_count", &self.quantum_count)
            .field("sync_target", &self.sync_target)
            .field("stack_size", &self.stack.len())
            .finish()
    }
}
