//! Small tour of the API: three busy workers preempted round-robin, one
//! waiter released by another thread's termination.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use uthreads::{
    current_thread_id, init, quanta_of, spawn, sync, terminate, total_quanta, MAIN_THREAD,
};

static WORK: [AtomicU64; 4] = [const { AtomicU64::new(0) }; 4];
static FINISH: AtomicBool = AtomicBool::new(false);

fn busy() {
    let me = current_thread_id();
    while !FINISH.load(Ordering::Relaxed) {
        WORK[me].fetch_add(1, Ordering::Relaxed);
    }
}

fn finisher() {
    while total_quanta() < 30 {
        std::hint::spin_loop();
    }
    FINISH.store(true, Ordering::Relaxed);
}

fn main() {
    init(20_000).expect("init");

    let workers: Vec<usize> = (0..3).map(|_| spawn(busy).expect("spawn")).collect();
    let finisher = spawn(finisher).expect("spawn");

    // Main waits for the finisher to return, which terminates it.
    sync(finisher).expect("sync");

    println!("total quanta: {}", total_quanta());
    for tid in &workers {
        println!(
            "thread {tid}: {} quanta, {} iterations",
            quanta_of(*tid).unwrap_or(0),
            WORK[*tid].load(Ordering::Relaxed)
        );
    }
    for tid in workers {
        let _ = terminate(tid);
    }
    let _ = terminate(MAIN_THREAD);
}
