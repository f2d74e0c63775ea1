use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::config::WheelConfig;
use crate::common::error::Result;
use crate::common::time::CalendarTime;
use crate::scheduler::client::TimeWheel;
use crate::scheduler::core::WheelCore;
use crate::scheduler::registry::TaskRegistry;
use crate::wheel::{WheelClock, WheelStack};

/// 时间轮构建器
///
/// 一步步配置并拉起调度器：校验配置、建轮、对齐指针、
/// 拉起事件循环，最后交回 `TimeWheel` 句柄。
pub struct TimeWheelBuilder {
    config: WheelConfig,
    /// 表盘初始时刻；不设置则取本地挂钟
    origin: Option<CalendarTime>,
    /// 外部注入的停机信号，用于多组件协同
    shutdown: Option<CancellationToken>,
}

impl TimeWheelBuilder {
    pub fn new() -> Self {
        Self {
            config: WheelConfig::default(),
            origin: None,
            shutdown: None,
        }
    }

    /// 整体替换配置
    pub fn config(mut self, config: WheelConfig) -> Self {
        self.config = config;
        self
    }

    /// [可选] 固定表盘的初始时刻
    ///
    /// 默认按本地挂钟对齐；测试和演示场景可以用它钉住起点。
    pub fn origin(mut self, origin: CalendarTime) -> Self {
        self.origin = Some(origin);
        self
    }

    /// [可选] 注入全局停机信号
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// [核心] 构建并启动
    ///
    /// 必须在 Tokio 运行时内调用：事件循环以 `tokio::spawn` 拉起。
    pub fn build(self) -> Result<TimeWheel> {
        self.config.validate()?;

        let origin = self.origin.unwrap_or_else(CalendarTime::now_local);
        let granularity = self.config.granularity;
        let stack = WheelStack::new(granularity, origin);
        let clock = WheelClock::new(stack.now());

        let (add_tx, add_rx) = mpsc::channel(self.config.queue_capacity);
        let (remove_tx, remove_rx) = mpsc::channel(self.config.queue_capacity);
        let shutdown = self.shutdown.unwrap_or_default();

        let core = WheelCore::new(
            stack,
            clock.clone(),
            self.config.tick_interval(),
            add_rx,
            remove_rx,
            shutdown.clone(),
        );
        tokio::spawn(core.run());

        Ok(TimeWheel {
            add_tx,
            remove_tx,
            registry: TaskRegistry::new(),
            clock,
            shutdown,
            granularity,
        })
    }
}

impl Default for TimeWheelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
