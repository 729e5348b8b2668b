//! End-to-end scenarios with the real timer and real context switches.
//!
//! The library is process-wide and terminating thread 0 exits the process,
//! so everything runs from one `main` (no libtest harness) in a fixed order
//! and the run ends with `terminate(0)`. Workers only touch atomics: the
//! std output lock is not reentrant-safe across logical threads.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use uthreads::signal_safe::{preemption_masked, CriticalSection};
use uthreads::{
    block, current_thread_id, init, quanta_of, resume, spawn, state_of, sync, terminate,
    total_quanta, ThreadError, ThreadState, MAIN_THREAD, MAX_THREADS,
};

const QUANTUM_USECS: i64 = 5_000;
const TRACE_LEN: usize = 24;

static TRACE: [AtomicUsize; TRACE_LEN] = [const { AtomicUsize::new(usize::MAX) }; TRACE_LEN];
static TRACE_POS: AtomicUsize = AtomicUsize::new(0);
static LAST_QUANTUM: AtomicU64 = AtomicU64::new(0);

fn spin_until(cond: impl Fn() -> bool) {
    while !cond() {
        std::hint::spin_loop();
    }
}

/// Records the running thread once per quantum.
fn record_quantum() {
    let _cs = CriticalSection::enter();
    let now = total_quanta();
    if LAST_QUANTUM.swap(now, Ordering::SeqCst) != now {
        let pos = TRACE_POS.fetch_add(1, Ordering::SeqCst);
        if pos < TRACE_LEN {
            TRACE[pos].store(current_thread_id(), Ordering::SeqCst);
        }
    }
}

fn tracing_worker() {
    loop {
        record_quantum();
    }
}

fn main_only_quanta() {
    // queries mask the timer themselves and keep an enclosing section intact
    let start = total_quanta();
    assert!(!preemption_masked());
    {
        let _cs = CriticalSection::enter();
        assert_eq!(quanta_of(MAIN_THREAD).map(|q| q <= total_quanta()), Ok(true));
        assert_eq!(current_thread_id(), MAIN_THREAD);
        assert!(preemption_masked());
    }
    assert!(!preemption_masked());
    spin_until(|| total_quanta() >= start + 3);
    loop {
        let before = total_quanta();
        let own = quanta_of(MAIN_THREAD).unwrap();
        if before == total_quanta() {
            assert_eq!(own, before);
            break;
        }
    }
}

fn round_robin() {
    let a = spawn(tracing_worker).unwrap();
    let b = spawn(tracing_worker).unwrap();
    let c = spawn(tracing_worker).unwrap();
    assert_eq!((a, b, c), (1, 2, 3));

    LAST_QUANTUM.store(total_quanta(), Ordering::SeqCst);
    spin_until(|| {
        record_quantum();
        TRACE_POS.load(Ordering::SeqCst) >= TRACE_LEN
    });

    let trace: Vec<usize> = TRACE.iter().map(|t| t.load(Ordering::SeqCst)).collect();
    let cycle = [a, b, c, MAIN_THREAD];
    let offset = cycle.iter().position(|&id| id == trace[0]).unwrap();
    for (i, id) in trace.iter().enumerate() {
        assert_eq!(*id, cycle[(offset + i) % cycle.len()], "trace {trace:?}");
    }

    for tid in [a, b, c] {
        assert_eq!(state_of(tid), Ok(ThreadState::Ready));
        terminate(tid).unwrap();
        assert_eq!(quanta_of(tid), Err(ThreadError::InvalidThreadId));
    }
}

static GO: AtomicBool = AtomicBool::new(false);
static RELEASED: AtomicUsize = AtomicUsize::new(0);
static TARGET: AtomicUsize = AtomicUsize::new(0);

fn target_worker() {
    spin_until(|| GO.load(Ordering::SeqCst));
    terminate(current_thread_id()).unwrap();
}

fn waiting_worker() {
    sync(TARGET.load(Ordering::SeqCst)).unwrap();
    RELEASED.fetch_add(1, Ordering::SeqCst);
    loop {
        std::hint::spin_loop();
    }
}

fn sync_release() {
    let target = spawn(target_worker).unwrap();
    TARGET.store(target, Ordering::SeqCst);
    let w1 = spawn(waiting_worker).unwrap();
    let w2 = spawn(waiting_worker).unwrap();

    spin_until(|| {
        state_of(w1) == Ok(ThreadState::Blocked) && state_of(w2) == Ok(ThreadState::Blocked)
    });

    // resume does not lift a sync block
    resume(w1).unwrap();
    assert_eq!(state_of(w1), Ok(ThreadState::Blocked));
    assert_eq!(RELEASED.load(Ordering::SeqCst), 0);

    GO.store(true, Ordering::SeqCst);
    spin_until(|| RELEASED.load(Ordering::SeqCst) == 2);
    assert_eq!(quanta_of(target), Err(ThreadError::InvalidThreadId));
    assert_eq!(sync(target), Err(ThreadError::InvalidThreadId));

    terminate(w1).unwrap();
    terminate(w2).unwrap();
}

static AFTER_TERMINATE: AtomicBool = AtomicBool::new(false);
static RETURNED: AtomicBool = AtomicBool::new(false);

static STARTED: AtomicBool = AtomicBool::new(false);

fn self_terminating() {
    STARTED.store(true, Ordering::SeqCst);
    terminate(current_thread_id()).unwrap();
    AFTER_TERMINATE.store(true, Ordering::SeqCst);
}

fn returning() {
    RETURNED.store(true, Ordering::SeqCst);
}

fn self_termination() {
    let a = spawn(self_terminating).unwrap();
    let b = spawn(returning).unwrap();
    spin_until(|| STARTED.load(Ordering::SeqCst) && RETURNED.load(Ordering::SeqCst));
    spin_until(|| state_of(a).is_err());
    spin_until(|| state_of(b).is_err());
    assert!(!AFTER_TERMINATE.load(Ordering::SeqCst));
    assert!(RETURNED.load(Ordering::SeqCst));
    assert_eq!(spawn(returning), Ok(1));
    spin_until(|| state_of(1).is_err());
}

static BLOCK_ROUNDS: AtomicUsize = AtomicUsize::new(0);

fn blocking_worker() {
    loop {
        block(current_thread_id()).unwrap();
        BLOCK_ROUNDS.fetch_add(1, Ordering::SeqCst);
    }
}

fn block_resume() {
    let a = spawn(blocking_worker).unwrap();
    spin_until(|| state_of(a) == Ok(ThreadState::Blocked));
    block(a).unwrap();
    block(a).unwrap();
    assert_eq!(state_of(a), Ok(ThreadState::Blocked));
    assert_eq!(BLOCK_ROUNDS.load(Ordering::SeqCst), 0);

    resume(a).unwrap();
    spin_until(|| BLOCK_ROUNDS.load(Ordering::SeqCst) == 1);
    spin_until(|| state_of(a) == Ok(ThreadState::Blocked));
    terminate(a).unwrap();
}

fn idle() {
    block(current_thread_id()).unwrap();
}

static SLEEPER: AtomicUsize = AtomicUsize::new(0);
static LONE_RESULT: AtomicUsize = AtomicUsize::new(0);
static LONE_STILL_RUNNING: AtomicBool = AtomicBool::new(false);

// 1: block returned Deadlock, 2: it returned Ok, 3: any other error
fn lone_worker() {
    let sleeper = SLEEPER.load(Ordering::SeqCst);
    spin_until(|| {
        state_of(MAIN_THREAD) == Ok(ThreadState::Blocked)
            && state_of(sleeper) == Ok(ThreadState::Blocked)
    });
    let outcome = match block(current_thread_id()) {
        Err(ThreadError::Deadlock) => 1,
        Ok(()) => 2,
        Err(_) => 3,
    };
    LONE_RESULT.store(outcome, Ordering::SeqCst);
    LONE_STILL_RUNNING.store(
        state_of(current_thread_id()) == Ok(ThreadState::Running),
        Ordering::SeqCst,
    );
    // returning releases main from its sync
}

fn deadlock_refused() {
    let sleeper = spawn(idle).unwrap();
    SLEEPER.store(sleeper, Ordering::SeqCst);
    let lone = spawn(lone_worker).unwrap();

    // lone is the only thread left to run once main waits on it
    sync(lone).unwrap();
    assert_eq!(LONE_RESULT.load(Ordering::SeqCst), 1);
    assert!(LONE_STILL_RUNNING.load(Ordering::SeqCst));
    assert_eq!(state_of(lone), Err(ThreadError::InvalidThreadId));

    // main waiting on a blocked thread with nothing ready
    spin_until(|| state_of(sleeper) == Ok(ThreadState::Blocked));
    assert_eq!(sync(sleeper), Err(ThreadError::Deadlock));
    assert_eq!(state_of(MAIN_THREAD), Ok(ThreadState::Running));
    assert_eq!(state_of(sleeper), Ok(ThreadState::Blocked));
    terminate(sleeper).unwrap();
}

fn table_capacity() {
    let mut spawned = Vec::new();
    for expected in 1..MAX_THREADS {
        assert_eq!(spawn(idle), Ok(expected));
        spawned.push(expected);
    }
    assert_eq!(spawn(idle), Err(ThreadError::MaxThreadsReached));
    for tid in spawned {
        terminate(tid).unwrap();
    }
    assert_eq!(spawn(idle), Ok(1));
    terminate(1).unwrap();
}

fn main() {
    assert_eq!(quanta_of(0), Err(ThreadError::NotInitialized));
    assert_eq!(init(0), Err(ThreadError::InvalidQuantum));
    assert_eq!(init(-1), Err(ThreadError::InvalidQuantum));

    init(QUANTUM_USECS).unwrap();
    assert_eq!(init(QUANTUM_USECS), Err(ThreadError::AlreadyInitialized));
    assert_eq!(current_thread_id(), MAIN_THREAD);
    assert!(total_quanta() >= 1);

    assert_eq!(block(MAIN_THREAD), Err(ThreadError::MainThread));
    assert_eq!(sync(MAIN_THREAD), Err(ThreadError::SelfSync));
    assert_eq!(sync(current_thread_id()), Err(ThreadError::SelfSync));
    assert_eq!(quanta_of(1), Err(ThreadError::InvalidThreadId));
    assert_eq!(terminate(MAX_THREADS), Err(ThreadError::InvalidThreadId));

    main_only_quanta();
    round_robin();
    sync_release();
    self_termination();
    block_resume();
    deadlock_refused();
    table_capacity();

    println!("runtime: all scenarios passed");
    let _ = terminate(MAIN_THREAD);
    unreachable!("terminating the main thread exits the process");
}
