//! 端到端调度场景
//!
//! 全部跑在 tokio 的暂停时钟上：表盘起点钉在 2021-09-01 12:00:00，
//! 虚拟时间一格一格推进，断言完全确定。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kairos::{CalendarTime, Job, RecurrenceSpec, SchedulerError, TimeWheel};

fn wheel_at(origin: &str) -> TimeWheel {
    TimeWheel::builder()
        .origin(CalendarTime::parse(origin).unwrap())
        .build()
        .unwrap()
}

#[derive(Clone, Default)]
struct Counter(Arc<AtomicUsize>);

impl Counter {
    fn bump(&self) -> impl Fn() + Send + Sync + 'static {
        let inner = self.0.clone();
        move || {
            inner.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn hits(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// 推进虚拟时间并留出余量让已派发的回调落地
async fn run_for(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs) + Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn once_task_fires_after_delay() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let counter = Counter::default();

    wheel
        .schedule_after(Job::named("single-shot", counter.bump()), 10)
        .await
        .unwrap();

    run_for(9).await;
    assert_eq!(counter.hits(), 0, "第 10 秒之前不应触发");

    run_for(1).await;
    assert_eq!(counter.hits(), 1);

    run_for(60).await;
    assert_eq!(counter.hits(), 1, "单次任务只触发一次");
}

#[tokio::test(start_paused = true)]
async fn once_task_fires_at_absolute_timestamp() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let counter = Counter::default();

    wheel
        .schedule_at(counter.bump(), "2021-09-01 13:00:00")
        .await
        .unwrap();

    run_for(3_599).await;
    assert_eq!(counter.hits(), 0);

    run_for(1).await;
    assert_eq!(counter.hits(), 1);
    assert!(wheel
        .current_time()
        .to_string()
        .starts_with("2021-09-01 13:00:0"));
}

#[tokio::test(start_paused = true)]
async fn recurring_every_five_seconds() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let fired_at = Arc::new(Mutex::new(Vec::new()));

    let probe = wheel.clone();
    let record = fired_at.clone();
    wheel
        .schedule_recurring(
            move || record.lock().unwrap().push(probe.current_time().second),
            RecurrenceSpec {
                second: "/5".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    run_for(30).await;
    let seconds = fired_at.lock().unwrap().clone();
    // 00 秒本身可整除, 立即触发一次, 之后每 5 秒一次
    assert_eq!(seconds.len(), 7);
    assert!(seconds.iter().all(|s| s % 5 == 0), "{seconds:?}");
}

#[tokio::test(start_paused = true)]
async fn recurring_at_second_zero_runs_once_a_minute() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let counter = Counter::default();

    wheel
        .schedule_recurring(
            counter.bump(),
            RecurrenceSpec {
                second: "0".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    run_for(125).await;
    // 12:00:00 (立即), 12:01:00, 12:02:00
    assert_eq!(counter.hits(), 3);
}

#[tokio::test(start_paused = true)]
async fn recurring_half_past_fires_hourly() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let counter = Counter::default();

    wheel
        .schedule_recurring(
            counter.bump(),
            RecurrenceSpec {
                minute: "30".into(),
                second: "0".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    run_for(1_801).await;
    assert_eq!(counter.hits(), 1, "12:30:00 第一次");

    run_for(3_600).await;
    assert_eq!(counter.hits(), 2, "13:30:00 第二次, 严格按小时重复");
}

#[tokio::test(start_paused = true)]
async fn cancel_prevents_the_fire() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let counter = Counter::default();

    let id = wheel.schedule_after(counter.bump(), 10).await.unwrap();
    wheel.cancel(id).await;

    run_for(30).await;
    assert_eq!(counter.hits(), 0);

    // 再取消一次 (以及取消根本不存在的 id) 都是静默空操作
    wheel.cancel(id).await;
    wheel.cancel(424_242).await;
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_a_recurring_task() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let counter = Counter::default();

    let id = wheel
        .schedule_recurring(
            counter.bump(),
            RecurrenceSpec {
                second: "/5".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    run_for(7).await;
    let before = counter.hits();
    assert!(before >= 2, "00 与 05 秒各触发一次");

    wheel.cancel(id).await;
    run_for(30).await;
    assert_eq!(counter.hits(), before, "取消之后不再触发");
}

#[tokio::test(start_paused = true)]
async fn horizon_and_spec_errors_are_synchronous() {
    let wheel = wheel_at("2021-09-01 12:00:00");

    let too_far = 10 * 365 * 24 * 3_600 + 1;
    assert!(matches!(
        wheel.schedule_after(|| {}, too_far).await,
        Err(SchedulerError::OutOfHorizon(_))
    ));

    assert!(matches!(
        wheel.schedule_at(|| {}, "某个时候").await,
        Err(SchedulerError::BadSpec(_))
    ));

    assert!(matches!(
        wheel
            .schedule_recurring(
                || {},
                RecurrenceSpec {
                    second: "5x".into(),
                    ..Default::default()
                },
            )
            .await,
        Err(SchedulerError::BadSpec(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn past_timestamp_fires_immediately() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let counter = Counter::default();

    wheel
        .schedule_at(counter.bump(), "2021-09-01 11:00:00")
        .await
        .unwrap();

    run_for(1).await;
    assert_eq!(counter.hits(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_halts_the_loop() {
    let wheel = wheel_at("2021-09-01 12:00:00");
    let counter = Counter::default();

    wheel.schedule_after(counter.bump(), 5).await.unwrap();
    wheel.stop();

    run_for(20).await;
    assert_eq!(counter.hits(), 0, "停机后不再消费 tick");

    assert!(matches!(
        wheel.schedule_after(|| {}, 1).await,
        Err(SchedulerError::Shutdown)
    ));
}
