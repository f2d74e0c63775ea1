use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::common::time::{TimeUnit, HORIZON_SECS};
use crate::crontab::Recurrence;
use crate::scheduler::registry::TaskRegistry;
use crate::wheel::WheelClock;

// ==========================================
// 1. 用户回调 (Job)
// ==========================================

/// 用户回调
///
/// 一个无参闭包，外加可选的展示名；用户数据通过闭包捕获带入。
/// 调度器按引用保存它，每次到期恰好调用一次，从不内省回调本身，
/// 展示名只用于日志。
#[derive(Clone)]
pub struct Job {
    name: Option<String>,
    callback: Arc<dyn Fn() + Send + Sync + 'static>,
}

impl Job {
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            name: None,
            callback: Arc::new(callback),
        }
    }

    /// 带展示名的回调
    pub fn named(name: impl Into<String>, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            name: Some(name.into()),
            callback: Arc::new(callback),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn run(&self) {
        (self.callback)()
    }
}

impl<F> From<F> for Job
where
    F: Fn() + Send + Sync + 'static,
{
    fn from(callback: F) -> Self {
        Job::new(callback)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", self.name.as_deref().unwrap_or("<anonymous>"))
    }
}

// ==========================================
// 2. 触发时刻 (FireSpec)
// ==========================================

/// 一次性任务的触发时刻
#[derive(Debug, Clone)]
pub enum FireSpec {
    /// 从现在起延迟的秒数
    In(u64),
    /// 绝对时刻，`YYYY-MM-DD HH:MM:SS` (本地时间)
    At(String),
}

impl From<u64> for FireSpec {
    fn from(secs: u64) -> Self {
        FireSpec::In(secs)
    }
}

impl From<&str> for FireSpec {
    fn from(text: &str) -> Self {
        FireSpec::At(text.to_string())
    }
}

impl From<String> for FireSpec {
    fn from(text: String) -> Self {
        FireSpec::At(text)
    }
}

// ==========================================
// 3. 轮上任务 (Task)
// ==========================================

/// 在时间轮内部流转的任务
pub(crate) struct Task {
    pub id: u64,
    /// 剩余延迟，以最细层的单位计；插入算法逐层除尽它
    pub remaining: u64,
    /// 每一层的落点槽位，下标对应 `TimeUnit::index()`；
    /// 级联时下层据此决定是继续下放还是立即触发
    pub sites: [Option<u64>; 6],
    pub job: Arc<WrappedJob>,
}

impl Task {
    pub fn new(id: u64, remaining: u64, job: Arc<WrappedJob>) -> Self {
        Self {
            id,
            remaining,
            sites: [None; 6],
            job,
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("remaining", &self.remaining)
            .field("sites", &self.sites)
            .finish()
    }
}

#[cfg(test)]
impl Task {
    /// 只携带 id 与延迟的空任务，轮盘单元测试用
    pub fn noop(id: u64, remaining: u64) -> Self {
        let (add_tx, _rx) = mpsc::channel(1);
        let job = WrappedJob::once(
            id,
            Job::new(|| {}),
            TaskRegistry::new(),
            add_tx,
            WheelClock::new(crate::common::time::CalendarTime::new(2021, 1, 1, 0, 0, 0)),
            TimeUnit::Second,
        );
        Task::new(id, remaining, Arc::new(job))
    }
}

// ==========================================
// 4. 包装任务体 (WrappedJob)
// ==========================================

/// 包装后的任务体
///
/// 派发器拿到的永远是包装任务，不直接接触用户回调：
/// - 一次性任务：先把 id 移出存活集，再执行回调；
/// - 周期任务：先按当前表盘时间算好下一次延迟、把同 id 的新任务送回
///   添加通道，然后才执行回调 —— 回调再慢也不会推迟下一个触发窗口。
pub(crate) struct WrappedJob {
    pub id: u64,
    user: Job,
    recurrence: Option<Mutex<Recurrence>>,
    registry: TaskRegistry,
    add_tx: mpsc::Sender<Task>,
    clock: WheelClock,
    granularity: TimeUnit,
}

impl WrappedJob {
    pub fn once(
        id: u64,
        user: Job,
        registry: TaskRegistry,
        add_tx: mpsc::Sender<Task>,
        clock: WheelClock,
        granularity: TimeUnit,
    ) -> Self {
        Self {
            id,
            user,
            recurrence: None,
            registry,
            add_tx,
            clock,
            granularity,
        }
    }

    pub fn recurring(
        id: u64,
        user: Job,
        recurrence: Recurrence,
        registry: TaskRegistry,
        add_tx: mpsc::Sender<Task>,
        clock: WheelClock,
        granularity: TimeUnit,
    ) -> Self {
        Self {
            id,
            user,
            recurrence: Some(Mutex::new(recurrence)),
            registry,
            add_tx,
            clock,
            granularity,
        }
    }

    pub fn display_name(&self) -> &str {
        self.user.name().unwrap_or("<anonymous>")
    }

    /// 到期执行入口，跑在派发器拉起的独立任务上
    pub async fn fire(self: Arc<Self>) {
        match &self.recurrence {
            None => {
                self.registry.release(self.id);
                trace!(task_id = self.id, job = self.display_name(), "单次任务执行");
                self.user.run();
            }
            Some(recurrence) => {
                if !self.registry.contains(self.id) {
                    debug!(task_id = self.id, "任务已被取消, 不再续约");
                    return;
                }
                self.rearm(recurrence).await;
                trace!(task_id = self.id, job = self.display_name(), "周期任务执行");
                self.user.run();
            }
        }
    }

    /// 周期任务重新入轮
    ///
    /// 算不出合法的下一次延迟时丢弃任务并释放 id，避免打出紧密触发环。
    async fn rearm(self: &Arc<Self>, recurrence: &Mutex<Recurrence>) {
        let now = self.clock.now();
        let delay = recurrence.lock().next_delay(now);

        if delay < 0 {
            warn!(
                task_id = self.id,
                job = self.display_name(),
                "下一次执行时刻已成过去, 丢弃该周期任务"
            );
            self.registry.release(self.id);
            return;
        }
        if delay > HORIZON_SECS {
            warn!(
                task_id = self.id,
                delay, "下一次延迟超出十年视界, 丢弃该周期任务"
            );
            self.registry.release(self.id);
            return;
        }

        let units = (delay / self.granularity.unit_seconds()) as u64;
        let task = Task::new(self.id, units, self.clone());
        if self.add_tx.send(task).await.is_err() {
            trace!(task_id = self.id, "调度器已停机, 放弃续约");
            self.registry.release(self.id);
        }
    }
}
