#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use uthreads::{Config, NextState, Scheduler, ThreadState, MAIN_THREAD, MAX_THREADS};

#[derive(Debug, Arbitrary)]
enum SchedulerOperation {
    Spawn,
    Terminate(u8),
    Block(u8),
    Resume(u8),
    Preempt,
    Sync(u8),
    GetState(u8),
}

fn worker() {}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let operations: Result<Vec<SchedulerOperation>, _> = (0..256)
        .map(|_| SchedulerOperation::arbitrary(&mut u))
        .collect();

    if let Ok(ops) = operations {
        fuzz_scheduler(ops);
    }
});

fn fuzz_scheduler(operations: Vec<SchedulerOperation>) {
    let Ok(mut scheduler) = Scheduler::new(&Config::new(1_000).with_stack_size(16 * 1024)) else {
        return;
    };

    for op in operations {
        match op {
            SchedulerOperation::Spawn => {
                let _ = scheduler.spawn_thread(worker);
            }
            SchedulerOperation::Terminate(tid) => {
                let tid = tid as usize;
                if tid != scheduler.running() {
                    let _ = scheduler.retire(tid);
                }
            }
            SchedulerOperation::Block(tid) => {
                let tid = tid as usize;
                match scheduler.state_of(tid) {
                    Ok(ThreadState::Ready) if tid != MAIN_THREAD => {
                        let _ = scheduler.block_ready(tid);
                    }
                    Ok(ThreadState::Running) if tid != MAIN_THREAD && scheduler.has_ready() => {
                        scheduler.rotate(NextState::Blocked);
                    }
                    _ => {}
                }
            }
            SchedulerOperation::Resume(tid) => {
                let _ = scheduler.resume(tid as usize);
            }
            SchedulerOperation::Preempt => {
                assert!(scheduler.rotate(NextState::Ready).is_some());
            }
            SchedulerOperation::Sync(tid) => {
                let current = scheduler.running();
                if scheduler.has_ready() && scheduler.register_sync(current, tid as usize).is_ok() {
                    scheduler.rotate(NextState::Blocked);
                }
            }
            SchedulerOperation::GetState(tid) => {
                let _ = scheduler.state_of(tid as usize);
            }
        }

        assert!(scheduler.live_threads() <= MAX_THREADS);
        assert_eq!(scheduler.state_of(scheduler.running()), Ok(ThreadState::Running));
        for id in scheduler.ready_queue() {
            assert_eq!(scheduler.state_of(id), Ok(ThreadState::Ready));
        }
    }
}
