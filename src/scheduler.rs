//! Scheduler state and bookkeeping.
//!
//! [`Scheduler`] owns the thread table, the ready queue, the running slot,
//! quantum accounting and the dependency map used by `sync`. Its methods
//! only update bookkeeping; the control transfer itself is done by the
//! runtime, which asks [`Scheduler::rotate`] who runs next and then switches
//! contexts.

use crate::config::Config;
use crate::context::Context;
use crate::error::{ThreadError, ThreadResult};
use crate::thread::{Thread, ThreadId, ThreadState, MAIN_THREAD};
use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::vec::Vec;
use core::cell::UnsafeCell;

pub const MAX_THREADS: usize = 100;

/// What happens to the running thread when it gives up the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    /// Preempted; goes to the back of the ready queue.
    Ready,
    /// Leaves the ready queue until resumed or released.
    Blocked,
    /// Already removed from the table by the caller.
    Terminated,
}

pub struct Scheduler {
    threads: [Option<Box<Thread>>; MAX_THREADS],
    live: usize,
    ready: VecDeque<ThreadId>,
    running: ThreadId,
    total_quanta: u64,
    quantum_usecs: u64,
    stack_size: usize,
    dependencies: BTreeMap<ThreadId, BTreeSet<ThreadId>>,
    graveyard: Vec<Box<Thread>>,
}

impl Scheduler {
    /// Creates the scheduler with the main thread running its first quantum.
    pub fn new(config: &Config) -> ThreadResult<Self> {
        config.validate()?;

        let mut threads = [const { None }; MAX_THREADS];
        threads[MAIN_THREAD] = Some(Thread::main());

        Ok(Scheduler {
            threads,
            live: 1,
            // Never grows past MAX_THREADS, so pushes from the timer
            // handler don't allocate.
            ready: VecDeque::with_capacity(MAX_THREADS),
            running: MAIN_THREAD,
            total_quanta: 1,
            quantum_usecs: config.quantum(),
            stack_size: config.stack_size,
            dependencies: BTreeMap::new(),
            graveyard: Vec::with_capacity(1),
        })
    }

    pub fn running(&self) -> ThreadId {
        self.running
    }

    pub fn total_quanta(&self) -> u64 {
        self.total_quanta
    }

    pub fn quantum_usecs(&self) -> u64 {
        self.quantum_usecs
    }

    pub fn live_threads(&self) -> usize {
        self.live
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Ready queue, front first.
    pub fn ready_queue(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ready.iter().copied()
    }

    /// Ids of all live threads in ascending order.
    pub fn live_ids(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.threads
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|_| id))
    }

    pub fn get_thread(&self, tid: ThreadId) -> ThreadResult<&Thread> {
        self.threads
            .get(tid)
            .and_then(Option::as_deref)
            .ok_or(ThreadError::InvalidThreadId)
    }

    fn get_thread_mut(&mut self, tid: ThreadId) -> ThreadResult<&mut Thread> {
        self.threads
            .get_mut(tid)
            .and_then(Option::as_deref_mut)
            .ok_or(ThreadError::InvalidThreadId)
    }

    pub fn state_of(&self, tid: ThreadId) -> ThreadResult<ThreadState> {
        self.get_thread(tid).map(Thread::state)
    }

    pub fn quanta_of(&self, tid: ThreadId) -> ThreadResult<u64> {
        self.get_thread(tid).map(Thread::quantum_count)
    }

    /// Threads sync-blocked on `tid`, if any.
    pub fn waiters_of(&self, tid: ThreadId) -> Option<&BTreeSet<ThreadId>> {
        self.dependencies.get(&tid)
    }

    /// Creates a thread in the smallest free slot and queues it.
    pub fn spawn_thread(&mut self, entry: fn()) -> ThreadResult<ThreadId> {
        if self.live >= MAX_THREADS {
            return Err(ThreadError::MaxThreadsReached);
        }
        let id = (1..MAX_THREADS)
            .find(|&id| self.threads[id].is_none())
            .ok_or(ThreadError::MaxThreadsReached)?;

        self.threads[id] = Some(Thread::spawn(id, entry, self.stack_size));
        self.live += 1;
        self.ready.push_back(id);
        Ok(id)
    }

    /// Moves the running thread out of the way and promotes the front of
    /// the ready queue.
    ///
    /// Returns the new running id, which equals the old one when the running
    /// thread was preempted with nobody else ready. Returns `None`, changing
    /// nothing, when the running thread leaves and no thread is ready.
    pub fn rotate(&mut self, next: NextState) -> Option<ThreadId> {
        let current = self.running;
        // Pick and check the successor before touching any state, so a
        // `None` leaves the scheduler as it was.
        let candidate = match (self.ready.front().copied(), next) {
            (Some(id), _) => id,
            (None, NextState::Ready) => current,
            (None, _) => return None,
        };
        if self.threads.get(candidate).map_or(true, Option::is_none) {
            return None;
        }

        match next {
            NextState::Ready => {
                if let Some(thread) = self.threads[current].as_deref_mut() {
                    thread.state = ThreadState::Ready;
                    self.ready.push_back(current);
                }
            }
            NextState::Blocked => {
                if let Some(thread) = self.threads[current].as_deref_mut() {
                    thread.state = ThreadState::Blocked;
                }
            }
            NextState::Terminated => {}
        }

        // Cannot fail: the queue held `candidate`, or `current` was just pushed.
        let next_id = self.ready.pop_front()?;
        if let Some(thread) = self.threads[next_id].as_deref_mut() {
            thread.mark_running();
        }
        self.running = next_id;
        self.total_quanta += 1;
        Some(next_id)
    }

    /// Ready -> Blocked for a thread that is not running.
    pub fn block_ready(&mut self, tid: ThreadId) -> ThreadResult<()> {
        let thread = self.get_thread_mut(tid)?;
        if thread.state == ThreadState::Ready {
            thread.state = ThreadState::Blocked;
            self.ready.retain(|&id| id != tid);
        }
        Ok(())
    }

    /// Blocked -> Ready, unless the thread is waiting on a sync target.
    /// Returns whether the thread was moved.
    pub fn resume(&mut self, tid: ThreadId) -> ThreadResult<bool> {
        let thread = self.get_thread_mut(tid)?;
        if thread.state != ThreadState::Blocked || thread.is_sync_blocked() {
            return Ok(false);
        }
        thread.state = ThreadState::Ready;
        self.ready.push_back(tid);
        Ok(true)
    }

    /// Records `waiter` as waiting for `target` to terminate. The caller
    /// then blocks `waiter`.
    pub fn register_sync(&mut self, waiter: ThreadId, target: ThreadId) -> ThreadResult<()> {
        self.get_thread(target)?;
        if target == waiter {
            return Err(ThreadError::SelfSync);
        }
        if target == MAIN_THREAD {
            return Err(ThreadError::MainThread);
        }
        let thread = self.get_thread_mut(waiter)?;
        if thread.is_sync_blocked() {
            return Err(ThreadError::AlreadySynced);
        }
        thread.sync_target = Some(target);
        self.dependencies.entry(target).or_default().insert(waiter);
        Ok(())
    }

    /// Removes `tid` from the table and every queue it is in, and releases
    /// the threads waiting for it. The control block is handed back so the
    /// caller decides when its stack can be freed.
    pub fn retire(&mut self, tid: ThreadId) -> ThreadResult<Box<Thread>> {
        if tid == MAIN_THREAD {
            return Err(ThreadError::MainThread);
        }
        let thread = self
            .threads
            .get_mut(tid)
            .and_then(Option::take)
            .ok_or(ThreadError::InvalidThreadId)?;
        self.live -= 1;

        if thread.state == ThreadState::Ready {
            self.ready.retain(|&id| id != tid);
        }
        if let Some(target) = thread.sync_target {
            if let Some(waiters) = self.dependencies.get_mut(&target) {
                waiters.remove(&tid);
                if waiters.is_empty() {
                    self.dependencies.remove(&target);
                }
            }
        }
        self.release_waiters(tid);
        Ok(thread)
    }

    fn release_waiters(&mut self, tid: ThreadId) {
        let Some(waiters) = self.dependencies.remove(&tid) else {
            return;
        };
        for waiter in waiters {
            if let Some(thread) = self.threads[waiter].as_deref_mut() {
                thread.sync_target = None;
                if thread.state == ThreadState::Blocked {
                    thread.state = ThreadState::Ready;
                    self.ready.push_back(waiter);
                }
            }
        }
    }

    /// Parks a retired control block whose stack is still in use.
    pub(crate) fn bury(&mut self, thread: Box<Thread>) {
        self.graveyard.push(thread);
    }

    /// Frees parked control blocks. Must not run on a parked stack.
    pub(crate) fn reap(&mut self) -> usize {
        let reaped = self.graveyard.len();
        self.graveyard.clear();
        reaped
    }

    /// Context of `tid`, looking among parked control blocks as well.
    pub(crate) fn context_ptr(&mut self, tid: ThreadId) -> Option<*mut Context> {
        if let Some(thread) = self.threads.get_mut(tid).and_then(Option::as_deref_mut) {
            return Some(&mut thread.context as *mut Context);
        }
        self.graveyard
            .iter_mut()
            .rev()
            .find(|thread| thread.id == tid)
            .map(|thread| &mut thread.context as *mut Context)
    }

    /// Drops every control block except the one whose stack contains
    /// `active_sp`, which is leaked since it is still executing.
    pub(crate) fn release_all(&mut self, active_sp: usize) {
        let slots = self.threads.iter_mut().map(Option::take);
        let parked = self.graveyard.drain(..).map(Some);
        for thread in slots.chain(parked).flatten() {
            if thread.stack_contains(active_sp) {
                core::mem::forget(thread);
            }
        }
        self.ready.clear();
        self.dependencies.clear();
        self.live = 0;
    }
}

/// Storage for the process-wide scheduler.
pub(crate) struct SchedulerCell(UnsafeCell<Option<Scheduler>>);

// Only one native thread runs library code and every mutation happens with
// the preemption signal blocked.
unsafe impl Sync for SchedulerCell {}

impl SchedulerCell {
    pub(crate) const fn new() -> Self {
        SchedulerCell(UnsafeCell::new(None))
    }

    /// # Safety
    /// Returns mutable reference to scheduler. Caller must hold the critical
    /// section or otherwise exclude the timer handler.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get(&self) -> Option<&mut Scheduler> {
        unsafe { (*self.0.get()).as_mut() }
    }

    /// # Safety
    /// Same contract as [`SchedulerCell::get`].
    pub(crate) unsafe fn install(&self, scheduler: Scheduler) {
        unsafe { *self.0.get() = Some(scheduler) };
    }
}

pub(crate) static SCHEDULER: SchedulerCell = SchedulerCell::new();
