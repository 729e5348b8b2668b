//! x86_64 (System V) stack switching.

use super::{stack_top, Arch};

/// x86_64 architecture implementation.
pub struct X86_64Arch;

/// Default MXCSR (all exceptions masked, round to nearest).
const MXCSR_DEFAULT: u64 = 0x1F80;
/// Default x87 control word.
const FPU_CW_DEFAULT: u64 = 0x037F;

/// Words in a saved frame, lowest address first:
/// `mxcsr|fpucw, r15, r14, r13, r12, rbx, rbp, return address`.
const FRAME_WORDS: usize = 8;

/// Saves callee-saved state on the current stack, stores the stack pointer
/// through `rdi`, then unwinds the frame found at `rsi`.
#[unsafe(naked)]
unsafe extern "C" fn switch_stacks(save_sp: *mut usize, load_sp: usize) {
    core::arch::naked_asm!(
        "
        push rbp
        push rbx
        push r12
        push r13
        push r14
        push r15
        sub rsp, 8
        stmxcsr dword ptr [rsp]
        fnstcw word ptr [rsp + 4]

        mov [rdi], rsp
        mov rsp, rsi

        ldmxcsr dword ptr [rsp]
        fldcw word ptr [rsp + 4]
        add rsp, 8
        pop r15
        pop r14
        pop r13
        pop r12
        pop rbx
        pop rbp
        ret
        "
    );
}

/// First code a fresh thread executes: `start(rbx, r12)` via `r13`.
#[unsafe(naked)]
unsafe extern "C" fn start_shim() -> ! {
    core::arch::naked_asm!(
        "
        mov rdi, rbx
        mov rsi, r12
        and rsp, -16
        call r13
        ud2
        "
    );
}

impl Arch for X86_64Arch {
    unsafe fn switch_stacks(save_sp: *mut usize, load_sp: usize) {
        unsafe { switch_stacks(save_sp, load_sp) }
    }

    unsafe fn initial_frame(
        stack: &mut [u8],
        start: unsafe extern "C" fn(usize, usize) -> !,
        entry: usize,
        arg: usize,
    ) -> usize {
        // One spare word above the return address so the shim starts with
        // the same alignment a called function would see.
        let top = stack_top(stack) as *mut u64;
        unsafe {
            let frame = top.sub(FRAME_WORDS + 1);
            let words: [u64; FRAME_WORDS + 1] = [
                MXCSR_DEFAULT | (FPU_CW_DEFAULT << 32),
                0,                      // r15
                0,                      // r14
                start as usize as u64,  // r13
                arg as u64,             // r12
                entry as u64,           // rbx
                0,                      // rbp
                start_shim as usize as u64,
                0,
            ];
            core::ptr::copy_nonoverlapping(words.as_ptr(), frame, words.len());
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
        let sp = unsafe { X86_64Arch::initial_frame(&mut stack, never, 0x1111, 0x2222) };

        assert_eq!(sp, top - (FRAME_WORDS + 1) * 8);
        assert_eq!(sp % 16, 8);
        let words = sp as *const u64;
        unsafe {
            assert_eq!(*words.add(3), never as usize as u64);
            assert_eq!(*words.add(4), 0x2222);
            assert_eq!(*words.add(5), 0x1111);
            assert_eq!(*words.add(7), start_shim as usize as u64);
        }
    }
}
