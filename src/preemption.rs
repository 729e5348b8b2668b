//! Quantum timer.
//!
//! A virtual-time interval timer (`ITIMER_VIRTUAL`) raises `SIGVTALRM` each
//! time the process has consumed one quantum of user CPU time. The handler
//! preempts the running thread.

use crate::error::SystemError;
use crate::signal_safe::{CriticalSection, PREEMPT_SIGNAL};
use core::mem::MaybeUninit;
use core::ptr;

const USECS_PER_SEC: u64 = 1_000_000;

fn interval(quantum_usecs: u64) -> libc::timeval {
    libc::timeval {
        tv_sec: (quantum_usecs / USECS_PER_SEC) as libc::time_t,
        tv_usec: (quantum_usecs % USECS_PER_SEC) as libc::suseconds_t,
    }
}

fn set_timer(timer: &libc::itimerval) -> Result<(), SystemError> {
    if unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, timer, ptr::null_mut()) } == -1 {
        return Err(SystemError::SetITimer);
    }
    Ok(())
}

/// Installs the preemption handler for `SIGVTALRM`.
pub(crate) fn install() -> Result<(), SystemError> {
    unsafe {
        let mut sa = MaybeUninit::<libc::sigaction>::zeroed();
        if libc::sigemptyset(&mut (*sa.as_mut_ptr()).sa_mask) == -1 {
            return Err(SystemError::SigEmptySet);
        }
        (*sa.as_mut_ptr()).sa_flags = libc::SA_RESTART;
        (*sa.as_mut_ptr()).sa_sigaction = timer_handler as usize;

        if libc::sigaction(PREEMPT_SIGNAL, sa.as_ptr(), ptr::null_mut()) == -1 {
            return Err(SystemError::SigAction);
        }
    }
    Ok(())
}

/// (Re)starts the timer so the running thread gets a full quantum, with the
/// same length for every following interval.
pub(crate) fn arm(quantum_usecs: u64) -> Result<(), SystemError> {
    let period = interval(quantum_usecs);
    set_timer(&libc::itimerval {
        it_interval: period,
        it_value: period,
    })
}

/// Stops the timer. Used only on the way out of the process.
pub(crate) fn disarm() {
    let zero = interval(0);
    let _ = set_timer(&libc::itimerval {
        it_interval: zero,
        it_value: zero,
    });
}

extern "C" fn timer_handler(_sig: libc::c_int) {
    let errno = unsafe { *libc::__errno_location() };
    {
        let _cs = CriticalSection::enter();
        crate::runtime::preempt();
    }
    unsafe { *libc::__errno_location() = errno };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_splits_seconds() {
        let tv = interval(2_500_000);
        assert_eq!(tv.tv_sec, 2);
        assert_eq!(tv.tv_usec, 500_000);

        let tv = interval(999);
        assert_eq!(tv.tv_sec, 0);
        assert_eq!(tv.tv_usec, 999);
    }
}
