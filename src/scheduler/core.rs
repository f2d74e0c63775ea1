use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::common::model::Task;
use crate::scheduler::dispatcher::dispatch;
use crate::wheel::{WheelClock, WheelStack};

/// 事件循环
///
/// 唯一持有轮盘状态的长驻任务，串行消费四路事件：
/// 1. tick 源：推进指针、派发到期任务；
/// 2. 添加通道：新任务入轮 (含周期任务的续约)；
/// 3. 删除通道：按 id 摘除任务；
/// 4. 停机信号：停止消费并退出。
///
/// 外部只能通过通道与它交互，轮盘本身不需要任何锁。
pub(crate) struct WheelCore {
    stack: WheelStack,
    clock: WheelClock,
    tick: Duration,
    add_rx: mpsc::Receiver<Task>,
    remove_rx: mpsc::Receiver<u64>,
    shutdown: CancellationToken,
}

impl WheelCore {
    pub fn new(
        stack: WheelStack,
        clock: WheelClock,
        tick: Duration,
        add_rx: mpsc::Receiver<Task>,
        remove_rx: mpsc::Receiver<u64>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stack,
            clock,
            tick,
            add_rx,
            remove_rx,
            shutdown,
        }
    }

    pub async fn run(self) {
        let WheelCore {
            mut stack,
            clock,
            tick,
            mut add_rx,
            mut remove_rx,
            shutdown,
        } = self;

        // 第一格从一个完整间隔之后开始；错过的 tick 直接跳过，
        // 休眠唤醒后不做追赶
        let mut ticker = time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            granularity = %stack.granularity(),
            "时间轮启动, 表盘对齐到 {}",
            stack.now()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let due = stack.tick();
                    clock.store(stack.now());
                    if !due.is_empty() {
                        dispatch(due);
                    }
                }
                Some(task) = add_rx.recv() => {
                    match stack.insert(task) {
                        // 槽位就是当前指针：立即派发
                        Ok(Some(task)) => dispatch(vec![task]),
                        Ok(None) => {}
                        Err(e) => {
                            error!(error = %e, "任务插入破坏时间轮不变量, 事件循环终止");
                            break;
                        }
                    }
                }
                Some(id) = remove_rx.recv() => {
                    if stack.remove(id) {
                        debug!(task_id = id, "任务已从时间轮摘除");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }

        info!("时间轮停机, 表盘停在 {}", stack.now());
    }
}
