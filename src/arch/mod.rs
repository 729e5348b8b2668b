//! Architecture layer: the only place that touches registers and raw stacks.
//!
//! Each backend saves the callee-saved register file on the outgoing stack,
//! records the resulting stack pointer, and pops the incoming thread's frame
//! from the stack pointer it recorded earlier. The resume address is the
//! return address inside that frame.

/// Stack-switching primitives for one CPU architecture.
///
/// # Safety
///
/// Implementations perform raw control transfer. Callers must guarantee that
/// every stack pointer handed to `switch_stacks` was produced either by a
/// previous `switch_stacks` on a stack that is still alive, or by
/// `initial_frame` on a stack that is still alive.
pub trait Arch {
    /// Saves the current register frame, writes its stack pointer to
    /// `save_sp`, and resumes the frame at `load_sp`.
    ///
    /// Returns when some later call resumes the saved frame.
    ///
    /// # Safety
    ///
    /// - `save_sp` must be valid for writes
    /// - `load_sp` must point at a live frame built by this backend
    unsafe fn switch_stacks(save_sp: *mut usize, load_sp: usize);

    /// Lays out a frame at the top of `stack` that, once resumed, calls
    /// `start(entry, arg)` on an ABI-aligned stack. Returns its stack pointer.
    ///
    /// # Safety
    ///
    /// `stack` must outlive every switch into the returned frame.
    unsafe fn initial_frame(
        stack: &mut [u8],
        start: unsafe extern "C" fn(usize, usize) -> !,
        entry: usize,
        arg: usize,
    ) -> usize;
}

#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(target_arch = "x86_64")]
pub use x86_64::X86_64Arch as DefaultArch;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Arch as DefaultArch;

/// Highest 16-byte aligned address inside `stack`.
pub(crate) fn stack_top(stack: &mut [u8]) -> usize {
    let end = stack.as_mut_ptr() as usize + stack.len();
    end & !0xF
}
