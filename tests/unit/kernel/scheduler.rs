use super::*;
use crate::kernel::buffer::BufferId;
use crate::kernel::language::LanguageId;
use crate::kernel::task::TaskKind;

fn base() -> BufferSnapshot {
    BufferSnapshot::new(BufferId::new(7), LanguageId::Python, "x = 1\n")
}

#[test]
fn test_burst_coalesces_into_single_dispatch_of_latest() {
    let mut scheduler = DebouncedScheduler::new(Duration::from_millis(300));
    let t0 = Instant::now();

    let mut snapshot = base();
    for i in 0..5u64 {
        snapshot = snapshot.with_text(&format!("x = {i}\n"));
        scheduler.on_change(snapshot.clone(), t0 + Duration::from_millis(50 * i));
    }

    // 200ms after the last change: still quiet-interval pending.
    assert!(scheduler.poll(t0 + Duration::from_millis(400)).is_none());

    let dispatched = scheduler
        .poll(t0 + Duration::from_millis(500))
        .expect("dispatch after quiet interval");
    assert_eq!(dispatched.revision(), 5);
    assert_eq!(&*dispatched.text(), "x = 4\n");

    assert!(scheduler.poll(t0 + Duration::from_secs(10)).is_none());
}

#[test]
fn test_late_older_snapshot_does_not_replace_pending() {
    let mut scheduler = DebouncedScheduler::new(Duration::from_millis(10));
    let t0 = Instant::now();
    let r0 = base();
    let r1 = r0.with_text("y = 2\n");

    scheduler.on_change(r1.clone(), t0);
    scheduler.on_change(r0, t0);

    let dispatched = scheduler.poll(t0 + Duration::from_millis(20)).unwrap();
    assert_eq!(dispatched.revision(), r1.revision());
}

#[test]
fn test_dispatch_cancels_in_flight_task_on_older_revision() {
    let mut scheduler = DebouncedScheduler::new(Duration::from_millis(10));
    let t0 = Instant::now();
    let r0 = base();

    let task = TaskHandle::new(TaskKind::Analysis, Some(r0.revision()));
    let token = task.token();
    scheduler.begin(task);

    scheduler.on_change(r0.with_text("z = 3\n"), t0);
    assert!(!token.is_cancelled());

    scheduler.poll(t0 + Duration::from_millis(10)).unwrap();
    assert!(token.is_cancelled());
    assert!(scheduler.active().is_none());
}

#[test]
fn test_flush_bypasses_timer_and_cancels_prior_work() {
    let mut scheduler = DebouncedScheduler::new(Duration::from_secs(60));
    let t0 = Instant::now();
    let r0 = base();
    let r1 = r0.with_text("a = 1\n");

    let task = TaskHandle::new(TaskKind::Analysis, Some(r1.revision()));
    let token = task.token();
    scheduler.begin(task);
    scheduler.on_change(r1.clone(), t0);

    let now = scheduler.flush(Some(r0)).unwrap();
    assert_eq!(now.revision(), r1.revision());
    assert!(token.is_cancelled());
    assert!(scheduler.deadline().is_none());
    assert!(scheduler.poll(t0 + Duration::from_secs(120)).is_none());
}

#[test]
fn test_begin_replaces_and_cancels_predecessor() {
    let mut scheduler = DebouncedScheduler::default();
    let first = TaskHandle::new(TaskKind::Search, Some(0));
    let first_token = first.token();
    let first_id = first.id();
    scheduler.begin(first);

    let second = TaskHandle::new(TaskKind::Search, Some(1));
    let second_id = second.id();
    scheduler.begin(second);

    assert!(first_token.is_cancelled());
    assert!(!scheduler.finish(first_id));
    assert!(scheduler.finish(second_id));
    assert!(scheduler.active().is_none());
}
