//! Execution contexts.
//!
//! A [`Context`] is everything needed to resume a logical thread: the stack
//! pointer of its saved register frame (the resume address lives inside that
//! frame) and its blocked-signal mask. The rest of the crate treats contexts
//! as opaque; only this module and `arch` look inside.
//!
//! Capture and restore are fused into [`Context::switch`]: the call saves the
//! caller into one context and restores another, and it returns only when
//! some later switch restores the saved context again. That return is the
//! "resuming" path of a capture.
//!
//! The frame is laid out by this crate rather than by libc's `sigjmp_buf`,
//! so no pointer mangling applies to the stored stack pointer or resume
//! address.

use crate::arch::{Arch, DefaultArch};
use crate::signal_safe;

#[repr(C)]
pub struct Context {
    sp: usize,
    sigmask: libc::sigset_t,
}

impl Context {
    /// A context with nothing captured yet. The main thread starts with one
    /// of these; its first switch fills it in.
    pub(crate) fn empty() -> Self {
        Context {
            sp: 0,
            sigmask: signal_safe::empty_set(),
        }
    }

    pub(crate) fn is_captured(&self) -> bool {
        self.sp != 0
    }

    /// Builds the initial context of a thread that has never run: stack
    /// pointer at the top of `stack`, resume address at `entry` (through the
    /// start shim), empty signal mask.
    ///
    /// # Safety
    ///
    /// `stack` and `self` must stay at their current addresses for as long
    /// as the context may be switched to.
    pub(crate) unsafe fn prepare(&mut self, stack: &mut [u8], entry: fn()) {
        self.sigmask = signal_safe::empty_set();
        let arg = self as *const Context as usize;
        self.sp = unsafe { DefaultArch::initial_frame(stack, thread_start, entry as usize, arg) };
    }

    /// Saves the running thread into `from` and resumes `to`.
    ///
    /// Returns once another switch names `from` as its target, with the
    /// signal mask that was in force when `from` was captured.
    ///
    /// # Safety
    ///
    /// - both pointers must be valid, and `from` must stay valid until it is
    ///   resumed or abandoned
    /// - `to` must have been captured by an earlier switch or built by
    ///   [`Context::prepare`], and its stack must be alive
    pub(crate) unsafe fn switch(from: *mut Context, to: *const Context) {
        unsafe {
            signal_safe::save_mask(&mut (*from).sigmask);
            DefaultArch::switch_stacks(&raw mut (*from).sp, (*to).sp);
            signal_safe::restore_mask(&(*from).sigmask);
        }
    }
}

/// Entered through the start shim on a fresh stack.
unsafe extern "C" fn thread_start(entry: usize, context: usize) -> ! {
    let context = context as *const Context;
    unsafe { signal_safe::restore_mask(&(*context).sigmask) };

    let entry: fn() = unsafe { core::mem::transmute::<usize, fn()>(entry) };
    entry();

    crate::runtime::exit_current()
}
