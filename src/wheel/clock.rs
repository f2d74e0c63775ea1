use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::time::CalendarTime;

/// 表盘时间快照
///
/// 轮盘状态只属于事件循环，外部不允许直接读指针；循环在每次步进之后
/// 刷新这份快照，前端与周期任务的续约包装器据此计算延迟。
#[derive(Clone)]
pub(crate) struct WheelClock {
    inner: Arc<RwLock<CalendarTime>>,
}

impl WheelClock {
    pub fn new(initial: CalendarTime) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// 当前表盘时间
    pub fn now(&self) -> CalendarTime {
        *self.inner.read()
    }

    /// 由事件循环在步进后写入
    pub fn store(&self, now: CalendarTime) {
        *self.inner.write() = now;
    }
}
