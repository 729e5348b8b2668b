//! AArch64 (AAPCS64) stack switching.

use super::{stack_top, Arch};

/// AArch64 architecture implementation.
pub struct Aarch64Arch;

/// Saved frame, lowest address first: `x19..x28, x29, x30, d8..d15, fpcr, pad`.
const FRAME_WORDS: usize = 22;

#[unsafe(naked)]
unsafe extern "C" fn switch_stacks(save_sp: *mut usize, load_sp: usize) {
    core::arch::naked_asm!(
        "
        sub sp, sp, #176
        stp x19, x20, [sp, #0]
        stp x21, x22, [sp, #16]
        stp x23, x24, [sp, #32]
        stp x25, x26, [sp, #48]
        stp x27, x28, [sp, #64]
        stp x29, x30, [sp, #80]
        stp d8, d9, [sp, #96]
        stp d10, d11, [sp, #112]
        stp d12, d13, [sp, #128]
        stp d14, d15, [sp, #144]
        mrs x9, fpcr
        str x9, [sp, #160]

        mov x9, sp
        str x9, [x0]
        mov sp, x1

        ldr x9, [sp, #160]
        msr fpcr, x9
        ldp x19, x20, [sp, #0]
        ldp x21, x22, [sp, #16]
        ldp x23, x24, [sp, #32]
        ldp x25, x26, [sp, #48]
        ldp x27, x28, [sp, #64]
        ldp x29, x30, [sp, #80]
        ldp d8, d9, [sp, #96]
        ldp d10, d11, [sp, #112]
        ldp d12, d13, [sp, #128]
        ldp d14, d15, [sp, #144]
        add sp, sp, #176
        ret
        "
    );
}

/// First code a fresh thread executes: `start(x19, x20)` via `x21`.
#[unsafe(naked)]
unsafe extern "C" fn start_shim() -> ! {
    core::arch::naked_asm!(
        "
        mov x0, x19
        mov x1, x20
        mov x29, xzr
        blr x21
        brk #1
        "
    );
}

impl Arch for Aarch64Arch {
    unsafe fn switch_stacks(save_sp: *mut usize, load_sp: usize) {
        unsafe { switch_stacks(save_sp, load_sp) }
    }

    unsafe fn initial_frame(
        stack: &mut [u8],
        start: unsafe extern "C" fn(usize, usize) -> !,
        entry: usize,
        arg: usize,
    ) -> usize {
        let top = stack_top(stack) as *mut u64;
        let mut words = [0u64; FRAME_WORDS];
        words[0] = entry as u64; // x19
        words[1] = arg as u64; // x20
        words[2] = start as usize as u64; // x21
        words[11] = start_shim as usize as u64; // x30
        unsafe {
            let frame = top.sub(FRAME_WORDS);
            core::ptr::copy_nonoverlapping(words.as_ptr(), frame, FRAME_WORDS);
            frame as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    unsafe extern "C" fn never(_: usize, _: usize) -> ! {
        unreachable!()
    }

    #[test]
    fn initial_frame_layout() {
        let mut stack = vec![0u8; 4096];
        let top = stack_top(&mut stack);
        let sp = unsafe { Aarch64Arch::initial_frame(&mut stack, never, 0x1111, 0x2222) };

        assert_eq!(sp, top - FRAME_WORDS * 8);
        assert_eq!(sp % 16, 0);
        let words = sp as *const u64;
        unsafe {
            assert_eq!(*words, 0x1111);
            assert_eq!(*words.add(1), 0x2222);
            assert_eq!(*words.add(11), start_shim as usize as u64);
        }
    }
}
