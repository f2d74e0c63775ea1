// 1. 基础模块
pub mod common;

// 2. 时间轮核心 (由事件循环独占, 不对外暴露)
mod wheel;

// 3. 周期时刻表
pub mod crontab;

// 4. 调度器入口
pub mod scheduler;

pub use common::{CalendarTime, FireSpec, Job, Result, SchedulerError, TimeUnit, WheelConfig};
pub use crontab::RecurrenceSpec;
pub use scheduler::{TimeWheel, TimeWheelBuilder};
