mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use common::{now, remote_task, FixedClock, RecordingAlarms, RecordingJobs};
use focusflow::config::ReminderConfig;
use focusflow::reminders::{ReminderScheduler, ScheduleOutcome, SkipReason};
use focusflow::{Error, Priority, Task};

struct Fixture {
    scheduler: ReminderScheduler,
    alarms: Arc<RecordingAlarms>,
    jobs: Arc<RecordingJobs>,
    clock: Arc<FixedClock>,
}

fn fixture_with(settings: ReminderConfig) -> Fixture {
    let alarms = Arc::new(RecordingAlarms::default());
    let jobs = Arc::new(RecordingJobs::default());
    let clock = Arc::new(FixedClock::new(now()));
    let scheduler = ReminderScheduler::new(alarms.clone(), jobs.clone(), clock.clone(), settings);
    Fixture {
        scheduler,
        alarms,
        jobs,
        clock,
    }
}

fn fixture() -> Fixture {
    fixture_with(ReminderConfig::default())
}

fn starting_in(remote_id: &str, millis: i64) -> Task {
    remote_task(remote_id, "Standup").with_start_time(now() + ChronoDuration::milliseconds(millis))
}

#[test]
fn test_fire_instant_is_start_minus_offset() {
    let f = fixture();
    let task = starting_in("t1", 3_600_000).with_reminder_offset(10);

    let outcome = f.scheduler.schedule(&task).unwrap();

    let expected = now() + ChronoDuration::milliseconds(3_000_000);
    assert_eq!(outcome, ScheduleOutcome::Scheduled(expected));
    assert_eq!(f.scheduler.registration("task_t1").unwrap().fire_at, expected);
    assert_eq!(f.alarms.armed_at("task_t1"), Some(expected));
    assert_eq!(f.jobs.delay("task_t1"), Some(Duration::from_millis(3_000_000)));
}

#[test]
fn test_past_due_task_registers_nothing() {
    let f = fixture();
    let task = starting_in("t1", -1000).with_reminder_offset(0);

    let outcome = f.scheduler.schedule(&task).unwrap();

    assert_eq!(outcome, ScheduleOutcome::Skipped(SkipReason::PastDue));
    assert!(f.scheduler.registrations().is_empty());
    assert_eq!(f.alarms.count(), 0);
    assert_eq!(f.jobs.count(), 0);
}

#[test]
fn test_fire_instant_in_the_past_registers_nothing() {
    let f = fixture();
    // Starts in five minutes, but the reminder was due five minutes ago
    let task = starting_in("t1", 5 * 60_000).with_reminder_offset(10);

    assert_eq!(
        f.scheduler.schedule(&task).unwrap(),
        ScheduleOutcome::Skipped(SkipReason::PastDue)
    );
    assert!(f.scheduler.registrations().is_empty());
}

#[test]
fn test_offset_without_start_time_is_a_no_op() {
    let f = fixture();
    let task = remote_task("t1", "Someday").with_reminder_offset(30);

    assert_eq!(
        f.scheduler.schedule(&task).unwrap(),
        ScheduleOutcome::Skipped(SkipReason::NoStartTime)
    );
    assert_eq!(f.alarms.count(), 0);
}

#[test]
fn test_missing_offset_uses_configured_default() {
    let f = fixture_with(ReminderConfig {
        enabled: true,
        default_offset_minutes: 15,
    });
    let mut task = starting_in("t1", 3_600_000);
    task.reminder_offset_minutes = None;

    let outcome = f.scheduler.schedule(&task).unwrap();

    assert_eq!(outcome, ScheduleOutcome::Scheduled(now() + ChronoDuration::minutes(45)));
}

#[test]
fn test_disabled_reminders_register_nothing() {
    let f = fixture_with(ReminderConfig {
        enabled: false,
        default_offset_minutes: 10,
    });

    let outcome = f.scheduler.schedule(&starting_in("t1", 3_600_000)).unwrap();

    assert_eq!(outcome, ScheduleOutcome::Skipped(SkipReason::Disabled));
    assert_eq!(f.alarms.count(), 0);
}

#[test]
fn test_scheduling_twice_keeps_one_registration() {
    let f = fixture();
    f.scheduler.schedule(&starting_in("t1", 3_600_000)).unwrap();

    let moved = starting_in("t1", 7_200_000);
    f.scheduler.schedule(&moved).unwrap();

    let registrations = f.scheduler.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].fire_at, now() + ChronoDuration::minutes(110));
    assert_eq!(f.alarms.count(), 1);
    assert_eq!(f.jobs.count(), 1);
}

#[test]
fn test_cancel_removes_alarm_and_job() {
    let f = fixture();
    let task = starting_in("t1", 3_600_000);
    f.scheduler.schedule(&task).unwrap();

    assert!(f.scheduler.cancel(&task));

    assert!(f.scheduler.registrations().is_empty());
    assert_eq!(f.alarms.count(), 0);
    assert_eq!(f.jobs.count(), 0);
    assert!(!f.scheduler.cancel(&task));
    assert!(!f.scheduler.cancel_key("task_unknown"));
}

#[test]
fn test_rescheduling_into_the_past_cancels_previous_reminder() {
    let f = fixture();
    let task = starting_in("t1", 3_600_000);
    f.scheduler.schedule(&task).unwrap();

    f.clock.set(now() + ChronoDuration::hours(2));
    let outcome = f.scheduler.schedule(&task).unwrap();

    assert_eq!(outcome, ScheduleOutcome::Skipped(SkipReason::PastDue));
    assert!(f.scheduler.registration("task_t1").is_none());
    assert_eq!(f.alarms.count(), 0);
}

#[test]
fn test_alarm_and_fallback_show_the_same_notification() {
    let f = fixture();
    f.scheduler.schedule(&starting_in("t1", 3_600_000)).unwrap();

    let alarm = f.alarms.armed.lock().unwrap().get("task_t1").unwrap().1.clone();
    let job = f.jobs.jobs.lock().unwrap().get("task_t1").unwrap().1.clone();
    assert_eq!(alarm, job);
    assert_eq!(alarm.title, "Task Reminder");
    assert_eq!(alarm.body, "Don’t forget: Standup");
}

#[test]
fn test_fallback_failure_does_not_fail_scheduling() {
    let f = fixture();
    f.jobs.fail.store(true, Ordering::SeqCst);

    let outcome = f.scheduler.schedule(&starting_in("t1", 3_600_000)).unwrap();

    assert!(matches!(outcome, ScheduleOutcome::Scheduled(_)));
    assert_eq!(f.alarms.count(), 1);
    assert_eq!(f.jobs.count(), 0);
    assert_eq!(f.scheduler.registrations().len(), 1);
}

#[test]
fn test_alarm_failure_is_reported() {
    let f = fixture();
    f.alarms.fail.store(true, Ordering::SeqCst);

    let result = f.scheduler.schedule(&starting_in("t1", 3_600_000));

    assert!(matches!(result, Err(Error::Platform(_))));
    assert!(f.scheduler.registrations().is_empty());
}

#[test]
fn test_missing_permission_defers_and_requests_once() {
    let f = fixture();
    f.alarms.allowed.store(false, Ordering::SeqCst);

    let first = f.scheduler.schedule(&starting_in("t1", 3_600_000));
    let second = f.scheduler.schedule(&starting_in("t2", 7_200_000));

    assert!(matches!(first, Err(Error::NotPermitted(_))));
    assert!(matches!(second, Err(Error::NotPermitted(_))));
    assert_eq!(f.alarms.permission_requests.load(Ordering::SeqCst), 1);
    assert_eq!(f.scheduler.deferred_count(), 2);
    assert!(f.scheduler.registrations().is_empty());

    // Still missing: nothing is lost
    assert!(matches!(f.scheduler.retry_deferred(), Err(Error::NotPermitted(_))));
    assert_eq!(f.scheduler.deferred_count(), 2);

    f.alarms.allowed.store(true, Ordering::SeqCst);
    assert_eq!(f.scheduler.retry_deferred().unwrap(), 2);
    assert_eq!(f.scheduler.deferred_count(), 0);
    assert_eq!(f.scheduler.registrations().len(), 2);
}

#[test]
fn test_deferred_reschedule_drops_previous_registration() {
    let f = fixture();
    f.scheduler.schedule(&starting_in("t1", 3_600_000)).unwrap();
    assert_eq!(f.alarms.count(), 1);

    f.alarms.allowed.store(false, Ordering::SeqCst);
    let result = f.scheduler.schedule(&starting_in("t1", 7_200_000));

    assert!(matches!(result, Err(Error::NotPermitted(_))));
    assert!(f.scheduler.registration("task_t1").is_none());
    assert_eq!(f.alarms.count(), 0);
    assert_eq!(f.jobs.count(), 0);
    assert_eq!(f.scheduler.deferred_count(), 1);

    // Granting the permission arms the new instant only
    f.alarms.allowed.store(true, Ordering::SeqCst);
    assert_eq!(f.scheduler.retry_deferred().unwrap(), 1);
    assert_eq!(
        f.alarms.armed_at("task_t1"),
        Some(now() + ChronoDuration::minutes(110))
    );
}

#[test]
fn test_unrepresentable_fire_instant_is_skipped() {
    let f = fixture();
    f.scheduler.schedule(&starting_in("t1", 3_600_000)).unwrap();

    let latest = focusflow::utils::datetime::from_millis(8_210_266_876_799_999).unwrap();
    let task = remote_task("t1", "Far future")
        .with_start_time(latest)
        .with_reminder_offset(-1);

    assert_eq!(
        f.scheduler.schedule(&task).unwrap(),
        ScheduleOutcome::Skipped(SkipReason::OutOfRange)
    );
    assert!(f.scheduler.registration("task_t1").is_none());
    assert_eq!(f.alarms.count(), 0);
}

#[test]
fn test_cancel_drops_deferred_request() {
    let f = fixture();
    f.alarms.allowed.store(false, Ordering::SeqCst);
    let task = starting_in("t1", 3_600_000);
    let _ = f.scheduler.schedule(&task);

    assert!(f.scheduler.cancel(&task));
    assert_eq!(f.scheduler.deferred_count(), 0);
}

#[test]
fn test_task_without_identifier_is_rejected() {
    let f = fixture();
    let task = Task::new("Draft", Priority::Low).with_start_time(now() + ChronoDuration::hours(1));

    assert!(matches!(f.scheduler.schedule(&task), Err(Error::InvalidTask(_))));
}

#[test]
fn test_local_only_task_uses_local_key() {
    let f = fixture();
    let mut task = Task::new("Offline", Priority::Low).with_start_time(now() + ChronoDuration::hours(1));
    task.local_id = Some(5);

    f.scheduler.schedule(&task).unwrap();

    assert!(f.scheduler.registration("task_local_5").is_some());
}

#[test]
fn test_cancel_all() {
    let f = fixture();
    f.scheduler.schedule(&starting_in("t1", 3_600_000)).unwrap();
    f.scheduler.schedule(&starting_in("t2", 7_200_000)).unwrap();

    assert_eq!(f.scheduler.cancel_all(), 2);
    assert!(f.scheduler.registrations().is_empty());
    assert_eq!(f.alarms.count(), 0);
}
