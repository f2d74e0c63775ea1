use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::common::error::{Result, SchedulerError};
use crate::common::model::{FireSpec, Job, Task, WrappedJob};
use crate::common::time::{CalendarTime, TimeUnit, HORIZON_SECS};
use crate::crontab::{Recurrence, RecurrenceSpec};
use crate::scheduler::builder::TimeWheelBuilder;
use crate::scheduler::registry::TaskRegistry;
use crate::wheel::WheelClock;

/// 时间轮调度器句柄 (The Public Face)
///
/// 可以随意 Clone，多个句柄共享同一个事件循环。提交与取消都只是
/// 往通道里投一条消息，不会在轮盘工作上阻塞。
///
/// ```no_run
/// use kairos::{RecurrenceSpec, TimeWheel};
///
/// # async fn demo() -> kairos::Result<()> {
/// let wheel = TimeWheel::new()?;
///
/// // 10 秒后执行一次
/// let id = wheel.schedule_after(|| println!("hello"), 10).await?;
///
/// // 每分钟第 0 秒执行
/// wheel
///     .schedule_recurring(
///         || println!("tick"),
///         RecurrenceSpec { second: "0".into(), ..Default::default() },
///     )
///     .await?;
///
/// wheel.cancel(id).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TimeWheel {
    pub(crate) add_tx: mpsc::Sender<Task>,
    pub(crate) remove_tx: mpsc::Sender<u64>,
    pub(crate) registry: TaskRegistry,
    pub(crate) clock: WheelClock,
    pub(crate) shutdown: CancellationToken,
    pub(crate) granularity: TimeUnit,
}

impl TimeWheel {
    /// 以默认配置启动 (秒级粒度, 每秒一格)
    ///
    /// 必须在 Tokio 运行时内调用。
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> TimeWheelBuilder {
        TimeWheelBuilder::new()
    }

    /// 提交一次性任务
    ///
    /// `at` 接受两种形态：从现在起的秒数，或 `YYYY-MM-DD HH:MM:SS`
    /// 格式的绝对时刻 (本地时间；已经过去的时刻立即触发)。
    pub async fn schedule_once(
        &self,
        job: impl Into<Job>,
        at: impl Into<FireSpec>,
    ) -> Result<u64> {
        let delay = self.resolve_delay(at.into())?;
        self.submit(job.into(), delay, None).await
    }

    /// 提交延时任务 (从现在起 `secs` 秒后执行一次)
    pub async fn schedule_after(&self, job: impl Into<Job>, secs: u64) -> Result<u64> {
        self.schedule_once(job, FireSpec::In(secs)).await
    }

    /// 提交定点任务 (绝对时刻执行一次)
    pub async fn schedule_at(&self, job: impl Into<Job>, timestamp: &str) -> Result<u64> {
        self.schedule_once(job, FireSpec::At(timestamp.to_string()))
            .await
    }

    /// 提交周期任务
    ///
    /// 首次延迟在这里计算；之后每次触发都按当时的表盘时间重算，
    /// 所以非等距的时刻表 (例如月末) 也能走准。
    pub async fn schedule_recurring(
        &self,
        job: impl Into<Job>,
        spec: RecurrenceSpec,
    ) -> Result<u64> {
        let mut recurrence = Recurrence::compile(&spec)?;
        let delay = recurrence.next_delay(self.clock.now());
        if delay < 0 {
            return Err(SchedulerError::BadSpec(
                "recurrence has no future instant".to_string(),
            ));
        }
        self.submit(job.into(), delay, Some(recurrence)).await
    }

    /// 取消任务
    ///
    /// 未知 id 静默返回。已知 id 先移出存活集 (周期任务据此停止续约)，
    /// 再通知事件循环摘轮；本次 tick 已经派发出去的回调无法追回。
    pub async fn cancel(&self, id: u64) {
        if !self.registry.release(id) {
            return;
        }
        debug!(task_id = id, "取消请求已入队");
        // 停机竞态下事件循环可能已退出, 摘除自然也不再需要
        let _ = self.remove_tx.send(id).await;
    }

    /// 停机
    ///
    /// 事件循环停止消费 tick 与新任务；已经在飞的用户回调继续跑完。
    pub fn stop(&self) {
        info!("调度器停机信号已发出");
        self.shutdown.cancel();
    }

    /// 当前表盘时间
    pub fn current_time(&self) -> CalendarTime {
        self.clock.now()
    }

    // --- Private Helpers ---

    /// 把触发时刻折算成相对秒数
    fn resolve_delay(&self, spec: FireSpec) -> Result<i64> {
        match spec {
            FireSpec::In(secs) => Ok(i64::try_from(secs).unwrap_or(i64::MAX)),
            FireSpec::At(text) => {
                let target = CalendarTime::parse(&text)?;
                Ok(target.delta_seconds(&self.clock.now()).max(0))
            }
        }
    }

    /// 统一提交入口：视界校验、id 分配、回调包装、入队
    async fn submit(&self, job: Job, delay_secs: i64, recurrence: Option<Recurrence>) -> Result<u64> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::Shutdown);
        }
        if delay_secs > HORIZON_SECS {
            return Err(SchedulerError::OutOfHorizon(delay_secs));
        }

        let units = (delay_secs / self.granularity.unit_seconds()) as u64;
        let id = self.registry.allocate();
        let wrapped = match recurrence {
            None => WrappedJob::once(
                id,
                job,
                self.registry.clone(),
                self.add_tx.clone(),
                self.clock.clone(),
                self.granularity,
            ),
            Some(recurrence) => WrappedJob::recurring(
                id,
                job,
                recurrence,
                self.registry.clone(),
                self.add_tx.clone(),
                self.clock.clone(),
                self.granularity,
            ),
        };

        debug!(task_id = id, delay_secs, "提交任务");
        let task = Task::new(id, units, Arc::new(wrapped));
        if let Err(e) = self.add_tx.send(task).await {
            self.registry.release(id);
            return Err(e.into());
        }
        Ok(id)
    }
}
