//! Diagnostics written straight to stderr.
//!
//! Uses `write(2)` directly so reporting works without std and from inside a
//! critical section.

use crate::error::{SystemError, ThreadError};
use core::fmt::{self, Write};

pub const USAGE_PREFIX: &str = "thread library error: ";
pub const SYSTEM_PREFIX: &str = "system error: ";

struct Stderr;

impl Write for Stderr {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let written =
                unsafe { libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len()) };
            if written < 0 {
                if unsafe { *libc::__errno_location() } == libc::EINTR {
                    continue;
                }
                return Err(fmt::Error);
            }
            bytes = &bytes[written as usize..];
        }
        Ok(())
    }
}

fn write_usage(out: &mut impl Write, err: ThreadError) -> fmt::Result {
    writeln!(out, "{USAGE_PREFIX}{err}")
}

fn write_system(out: &mut impl Write, err: SystemError) -> fmt::Result {
    writeln!(out, "{SYSTEM_PREFIX}{err}")
}

pub(crate) fn usage(err: ThreadError) {
    let _ = write_usage(&mut Stderr, err);
    log::warn!("usage error: {err}");
}

pub(crate) fn system(err: SystemError) {
    let _ = write_system(&mut Stderr, err);
    log::error!("system error: {err}");
}
