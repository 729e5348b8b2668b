//! Blocking, resuming, and waiting for another thread to terminate.

use crate::error::{ThreadError, ThreadResult};
use crate::runtime::{report, scheduler, switch_threads};
use crate::scheduler::NextState;
use crate::signal_safe::CriticalSection;
use crate::thread::{ThreadId, ThreadState, MAIN_THREAD};
use log::debug;

/// Blocks thread `tid` until it is resumed. Blocking a blocked thread
/// succeeds and changes nothing; a thread blocking itself returns once it
/// has been resumed and scheduled again.
pub fn block(tid: ThreadId) -> ThreadResult<()> {
    report(block_inner(tid))
}

fn block_inner(tid: ThreadId) -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    let scheduler = scheduler()?;
    scheduler.reap();
    let state = scheduler.state_of(tid)?;
    if tid == MAIN_THREAD {
        return Err(ThreadError::MainThread);
    }

    match state {
        ThreadState::Blocked => Ok(()),
        ThreadState::Ready => {
            debug!("blocked thread {tid}");
            scheduler.block_ready(tid)
        }
        ThreadState::Running => {
            if !scheduler.has_ready() {
                return Err(ThreadError::Deadlock);
            }
            debug!("thread {tid} blocks itself");
            switch_threads(NextState::Blocked);
            Ok(())
        }
    }
}

/// Moves a blocked thread back to the ready queue. Threads that are not
/// blocked, or that are waiting in [`sync`], are left alone.
pub fn resume(tid: ThreadId) -> ThreadResult<()> {
    report(resume_inner(tid))
}

fn resume_inner(tid: ThreadId) -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    let scheduler = scheduler()?;
    scheduler.reap();
    if scheduler.resume(tid)? {
        debug!("resumed thread {tid}");
    }
    Ok(())
}

/// Blocks the calling thread until thread `tid` terminates.
///
/// Only `tid`'s termination releases the caller; [`resume`] does not.
pub fn sync(tid: ThreadId) -> ThreadResult<()> {
    report(sync_inner(tid))
}

fn sync_inner(tid: ThreadId) -> ThreadResult<()> {
    let _cs = CriticalSection::enter();
    let scheduler = scheduler()?;
    scheduler.reap();
    let current = scheduler.running();
    scheduler.get_thread(tid)?;
    if tid == current {
        return Err(ThreadError::SelfSync);
    }
    if tid == MAIN_THREAD {
        return Err(ThreadError::MainThread);
    }
    if !scheduler.has_ready() {
        return Err(ThreadError::Deadlock);
    }

    scheduler.register_sync(current, tid)?;
    debug!("thread {current} waits for thread {tid}");
    switch_threads(NextState::Blocked);
    Ok(())
}
