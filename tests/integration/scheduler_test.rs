use gravity::core::sampler::{ProbeResult, Scheduler, SlowReading, TaskId, TaskState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

async fn wait_idle(scheduler: &Scheduler, id: TaskId) {
    for _ in 0..500 {
        if scheduler.state(id) == Some(TaskState::Idle) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {} never finished", id);
}

#[tokio::test]
async fn test_cadence_over_many_cycles() {
    let mut scheduler = Scheduler::new(Handle::current());
    let runs = Arc::new(AtomicUsize::new(0));
    let job_runs = runs.clone();

    scheduler.register(TaskId::Disk, 3, move || {
        job_runs.fetch_add(1, Ordering::SeqCst);
        ProbeResult::Found {
            strategy: "df",
            value: SlowReading::Disk(Vec::new()),
        }
    });

    let mut started_at = Vec::new();
    for cycle in 1..=10 {
        if !scheduler.tick(cycle).is_empty() {
            started_at.push(cycle);
        }
        wait_idle(&scheduler, TaskId::Disk).await;
    }

    assert_eq!(started_at, vec![1, 4, 7, 10]);
    assert_eq!(runs.load(Ordering::SeqCst), 4);
    assert_eq!(scheduler.latest(TaskId::Disk).unwrap().cycle, 10);
}

#[tokio::test]
async fn test_slow_task_does_not_block_tick() {
    let mut scheduler = Scheduler::new(Handle::current());
    scheduler.register(TaskId::StorageHealth, 1, || {
        std::thread::sleep(Duration::from_millis(200));
        ProbeResult::Unavailable
    });
    scheduler.register(TaskId::Firmware, 1, || ProbeResult::Unavailable);

    let start = std::time::Instant::now();
    let started = scheduler.tick(1);
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(started, vec![TaskId::StorageHealth, TaskId::Firmware]);

    wait_idle(&scheduler, TaskId::Firmware).await;
    // The slow one is skipped while the fast one restarts
    assert_eq!(scheduler.tick(2), vec![TaskId::Firmware]);

    wait_idle(&scheduler, TaskId::StorageHealth).await;
    assert!(scheduler.has_completed(TaskId::StorageHealth));
    assert!(scheduler.latest(TaskId::StorageHealth).is_none());
}
