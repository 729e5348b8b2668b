//! Process-wide runtime: initialization, spawning, termination, queries,
//! and the context switch shared by preemption and voluntary yields.

use crate::config::Config;
use crate::context::Context;
use crate::diag;
use crate::error::{SystemError, ThreadError, ThreadResult};
use crate::preemption;
use crate::scheduler::{NextState, Scheduler, SCHEDULER};
use crate::signal_safe::{self, CriticalSection};
use crate::thread::{ThreadId, ThreadState, MAIN_THREAD};
use log::debug;
use portable_atomic::{AtomicBool, Ordering};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Prints the usage diagnostic for a failed call and passes the result on.
pub(crate) fn report<T>(result: ThreadResult<T>) -> ThreadResult<T> {
    if let Err(err) = &result {
        diag::usage(*err);
    }
    result
}

/// Mutable access to the scheduler for callers inside a critical section.
pub(crate) fn scheduler() -> ThreadResult<&'static mut Scheduler> {
    unsafe { SCHEDULER.get() }.ok_or(ThreadError::NotInitialized)
}

/// Initializes the library with `quantum_usecs` and default settings.
///
/// The calling thread becomes thread 0 and is running its first quantum.
pub fn init(quantum_usecs: i64) -> ThreadResult<()> {
    init_with(Config::new(quantum_usecs))
}

pub fn init_with(config: Config) -> ThreadResult<()> {
    report(init_inner(config))
}

fn init_inner(config: Config) -> ThreadResult<()> {
    config.validate()?;
    if INITIALIZED.load(Ordering::Acquire) {
        return Err(ThreadError::AlreadyInitialized);
    }

    signal_safe::prepare();
    let _cs = CriticalSection::enter();
    let scheduler = Scheduler::new(&config)?;
    let quantum = scheduler.quantum_usecs();
    unsafe { SCHEDULER.install(scheduler) };
    INITIALIZED.store(true, Ordering::Release);

    if let Err(err) = preemption::install() {
        fatal(err);
    }
    if let Err(err) = preemption::arm(quantum) {
        fatal(err);
    }
    debug!(
        "initialized: quantum {}us, stack {} bytes",
        quantum, config.stack_size
    );
    Ok(())
}

/// Creates a thread that starts at `entry` and appends it to the ready
/// queue. Returns its id, the smallest one free.
///
/// If `entry` returns, the thread terminates itself.
pub fn spawn(entry: fn()) -> ThreadResult<ThreadId> {
    report(spawn_inner(entry))
}

fn spawn_inner(entry: fn()) -> ThreadResult<ThreadId> {
    let _cs = CriticalSection::enter();
    let scheduler = scheduler()?;
    scheduler.reap();
    let id = scheduler.spawn_thread(entry)?;
    debug!("spawned thread {id}");
    Ok(id)
}

/// Terminates thread `tid`.
///
/// Terminating thread 0 releases every thread and exits the process with
/// status 0. A thread terminating itself does not return.
pub fn terminate(tid: ThreadId) -> ThreadResult<()> {
    report(terminate_inner(tid))
}

fn terminate_inner(tid: ThreadId) -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    let scheduler = scheduler()?;
    scheduler.reap();
    scheduler.get_thread(tid)?;

    if tid == MAIN_THREAD {
        debug!("main thread terminated, exiting");
        exit_process(0);
    }

    let running = scheduler.running();
    let thread = scheduler.retire(tid)?;
    debug!("terminated thread {tid}");
    if tid == running {
        // Still executing on this stack; freed by the next library call.
        scheduler.bury(thread);
        switch_threads(NextState::Terminated);
        fatal(SystemError::ResumedTerminated);
    }
    drop(thread);
    Ok(())
}

/// Terminates the calling thread. Used when an entry point returns.
pub(crate) fn exit_current() -> ! {
    let _ = terminate(current_thread_id());
    // Only thread 0 reaches here, and terminating it exits the process.
    fatal(SystemError::ResumedTerminated)
}

/// Id of the running thread.
pub fn current_thread_id() -> ThreadId {
    let _cs = CriticalSection::enter();
    unsafe { SCHEDULER.get() }.map_or(MAIN_THREAD, |s| s.running())
}

/// Quanta started since `init`, counting the main thread's first one.
pub fn total_quanta() -> u64 {
    let _cs = CriticalSection::enter();
    unsafe { SCHEDULER.get() }.map_or(0, |s| s.total_quanta())
}

/// Quanta during which `tid` was the running thread.
pub fn quanta_of(tid: ThreadId) -> ThreadResult<u64> {
    let _cs = CriticalSection::enter();
    report(scheduler().and_then(|s| s.quanta_of(tid)))
}

pub fn state_of(tid: ThreadId) -> ThreadResult<ThreadState> {
    let _cs = CriticalSection::enter();
    report(scheduler().and_then(|s| s.state_of(tid)))
}

/// Entry point of the timer handler; runs inside its critical section.
pub(crate) fn preempt() {
    if INITIALIZED.load(Ordering::Acquire) {
        switch_threads(NextState::Ready);
    }
}

/// Hands the CPU to the front of the ready queue, disposing of the running
/// thread as `next` says. Returns when the caller is scheduled again, which
/// never happens for `NextState::Terminated`.
///
/// Must be called inside a critical section.
pub(crate) fn switch_threads(next: NextState) {
    let Ok(scheduler) = scheduler() else {
        return;
    };
    let current = scheduler.running();
    let Some(next_id) = scheduler.rotate(next) else {
        fatal(SystemError::NoRunnableThread);
    };
    let quantum = scheduler.quantum_usecs();

    if next_id == current {
        if let Err(err) = preemption::arm(quantum) {
            fatal(err);
        }
        return;
    }

    let (Some(from), Some(to)) = (scheduler.context_ptr(current), scheduler.context_ptr(next_id))
    else {
        fatal(SystemError::NoRunnableThread);
    };
    if let Err(err) = preemption::arm(quantum) {
        fatal(err);
    }
    unsafe { Context::switch(from, to as *const Context) };
}

/// Stops the timer and drops every control block except the one executing.
fn release_all() {
    preemption::disarm();
    let marker = 0u8;
    let active_sp = &marker as *const u8 as usize;
    if let Some(scheduler) = unsafe { SCHEDULER.get() } {
        scheduler.release_all(active_sp);
    }
}

fn exit_process(status: libc::c_int) -> ! {
    release_all();
    unsafe { libc::exit(status) }
}

/// Reports an unrecoverable system failure and exits with status 1.
pub(crate) fn fatal(err: SystemError) -> ! {
    diag::system(err);
    exit_process(1)
}
