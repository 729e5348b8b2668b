use thiserror::Error;

/// Library usage errors.
///
/// These are reported on stderr and handed back to the caller; scheduler
/// state is left exactly as it was before the failing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadError {
    #[error("Thread ID not found")]
    InvalidThreadId,
    #[error("Operation not permitted on the main thread (ID == 0)")]
    MainThread,
    #[error("A thread can't sync on itself")]
    SelfSync,
    #[error("Thread is already waiting for another thread to terminate")]
    AlreadySynced,
    #[error("No other thread is ready to run")]
    Deadlock,
    #[error("Threads number has reached its maximum")]
    MaxThreadsReached,
    #[error("Quantum time can't be non-positive")]
    InvalidQuantum,
    #[error("Stack size is below the supported minimum")]
    InvalidStackSize,
    #[error("Library is not initialized")]
    NotInitialized,
    #[error("Library is already initialized")]
    AlreadyInitialized,
}

impl ThreadError {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadError::InvalidThreadId => "Thread ID not found",
            ThreadError::MainThread => "Operation not permitted on the main thread (ID == 0)",
            ThreadError::SelfSync => "A thread can't sync on itself",
            ThreadError::AlreadySynced => {
                "Thread is already waiting for another thread to terminate"
            }
            ThreadError::Deadlock => "No other thread is ready to run",
            ThreadError::MaxThreadsReached => "Threads number has reached its maximum",
            ThreadError::InvalidQuantum => "Quantum time can't be non-positive",
            ThreadError::InvalidStackSize => "Stack size is below the supported minimum",
            ThreadError::NotInitialized => "Library is not initialized",
            ThreadError::AlreadyInitialized => "Library is already initialized",
        }
    }
}

pub type ThreadResult<T> = Result<T, ThreadError>;

/// Failures of the underlying signal and timer machinery.
///
/// None of these are recoverable: once the preemption mechanism can't be
/// trusted the process releases every thread and exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SystemError {
    #[error("sigemptyset failed")]
    SigEmptySet,
    #[error("sigaddset failed")]
    SigAddSet,
    #[error("sigprocmask failed")]
    SigProcMask,
    #[error("sigaction failed")]
    SigAction,
    #[error("setitimer failed")]
    SetITimer,
    #[error("no runnable thread remains")]
    NoRunnableThread,
    #[error("a terminated thread was resumed")]
    ResumedTerminated,
}
