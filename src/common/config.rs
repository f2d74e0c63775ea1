use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::error::{Result, SchedulerError};
use crate::common::time::TimeUnit;

/// 时间轮配置
///
/// 支持 `serde` 序列化，可直接从 YAML/JSON 加载。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelConfig {
    /// 最细刻度层级
    ///
    /// - 说明: 决定实例化哪些轮盘 (year -> 该层)；被选中的一层负责触发任务，
    ///   更细的层级不会创建。
    /// - 默认值: `second`
    /// - 建议: 保持默认。粗于秒的粒度只做标称换算，适合演示场景。
    #[serde(default = "default_granularity")]
    pub granularity: TimeUnit,

    /// 指针步进间隔 (毫秒)
    ///
    /// - 说明: 每隔多久推进一次最细层指针。必须与 `granularity` 的单位一致，
    ///   否则表盘时间会和挂钟脱节。
    /// - 默认值: `None`，即取粒度单位本身 (秒级粒度 = 1000ms)。
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,

    /// 任务通道容量
    ///
    /// - 说明: 新增/删除两个通道的缓冲上限，满了之后提交端会等待 (背压)。
    /// - 默认值: 1024
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_granularity() -> TimeUnit {
    TimeUnit::Second
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            granularity: default_granularity(),
            tick_interval_ms: None,
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl WheelConfig {
    /// 实际使用的步进间隔
    pub fn tick_interval(&self) -> Duration {
        match self.tick_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_secs(self.granularity.unit_seconds() as u64),
        }
    }

    /// 构建前的参数校验
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(SchedulerError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if let Some(ms) = self.tick_interval_ms {
            let expected = self.granularity.unit_seconds() as u64 * 1_000;
            if ms != expected {
                return Err(SchedulerError::Config(format!(
                    "tick interval {}ms does not match the {} granularity ({}ms per tick)",
                    ms, self.granularity, expected
                )));
            }
        }
        Ok(())
    }
}
