//! Signal masks and the critical-section discipline.
//!
//! Every mutation of scheduler state happens with `SIGVTALRM` blocked, so
//! the timer handler never observes a half-updated scheduler. There is only
//! one native thread, so masking the signal is the whole locking story.

use crate::error::SystemError;
use crate::runtime::fatal;
use core::mem::MaybeUninit;
use core::ptr;

/// Signal that drives preemption.
pub const PREEMPT_SIGNAL: libc::c_int = libc::SIGVTALRM;

static PREEMPT_SET: spin::Once<libc::sigset_t> = spin::Once::new();

fn build_preempt_set() -> libc::sigset_t {
    let mut set = empty_set();
    if unsafe { libc::sigaddset(&mut set, PREEMPT_SIGNAL) } == -1 {
        fatal(SystemError::SigAddSet);
    }
    set
}

/// Builds the set used to mask the preemption signal. Idempotent.
pub(crate) fn prepare() {
    PREEMPT_SET.call_once(build_preempt_set);
}

fn preempt_set() -> &'static libc::sigset_t {
    PREEMPT_SET.call_once(build_preempt_set)
}

pub(crate) fn empty_set() -> libc::sigset_t {
    let mut set = MaybeUninit::<libc::sigset_t>::uninit();
    if unsafe { libc::sigemptyset(set.as_mut_ptr()) } == -1 {
        fatal(SystemError::SigEmptySet);
    }
    unsafe { set.assume_init() }
}

fn change_mask(how: libc::c_int, set: *const libc::sigset_t, old: *mut libc::sigset_t) {
    if unsafe { libc::pthread_sigmask(how, set, old) } != 0 {
        fatal(SystemError::SigProcMask);
    }
}

/// Stores the calling thread's blocked-signal mask in `out`.
pub(crate) fn save_mask(out: &mut libc::sigset_t) {
    change_mask(libc::SIG_SETMASK, ptr::null(), out);
}

/// Replaces the calling thread's blocked-signal mask with `mask`.
pub(crate) fn restore_mask(mask: &libc::sigset_t) {
    change_mask(libc::SIG_SETMASK, mask, ptr::null_mut());
}

/// RAII guard holding the preemption signal blocked.
///
/// Dropping the guard puts back the mask that was in force when it was
/// entered, so guards nest. A guard that lives across a context switch is
/// dropped by the same logical thread once it is resumed.
#[must_use]
pub struct CriticalSection {
    previous: libc::sigset_t,
}

impl CriticalSection {
    pub fn enter() -> Self {
        let mut previous = empty_set();
        change_mask(libc::SIG_BLOCK, preempt_set(), &mut previous);
        CriticalSection { previous }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        restore_mask(&self.previous);
    }
}

/// Whether the preemption signal is currently blocked for this thread.
pub fn preemption_masked() -> bool {
    let mut current = empty_set();
    save_mask(&mut current);
    unsafe { libc::sigismember(&current, PREEMPT_SIGNAL) == 1 }
}
