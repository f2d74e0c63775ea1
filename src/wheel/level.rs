use std::collections::HashMap;
use std::mem;

use ahash::RandomState;

use crate::common::model::Task;
use crate::common::time::TimeUnit;

/// 单层轮盘
///
/// 一个日历刻度对应一圈槽位。指针 (`cursor`) 存的是日历值而不是数组下标：
/// 月/日从 1 起步，时/分/秒从 0 起步，年轮以启动年份为锚点、按 10 个
/// 刻度环形复用。槽位下标统一经 `offset()` 归一化成 0 基。
pub(crate) struct WheelLevel {
    unit: TimeUnit,
    slots: Vec<Vec<Task>>,
    /// 当前指针 (日历值)
    cursor: u32,
    /// 本层最小日历值；年轮取启动年份
    origin: u32,
    /// 仍停留在本层的任务 id -> 槽位，取消时按它定位
    sites: HashMap<u64, u64, RandomState>,
}

impl WheelLevel {
    pub fn new(unit: TimeUnit, cursor: u32) -> Self {
        let origin = match unit {
            TimeUnit::Year => cursor,
            TimeUnit::Month | TimeUnit::Day => 1,
            _ => 0,
        };
        let slot_count = unit.slot_count() as usize;
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, Vec::new);
        Self {
            unit,
            slots,
            cursor,
            origin,
            sites: HashMap::with_hasher(RandomState::new()),
        }
    }

    #[inline]
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// 指针的日历值
    #[inline]
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// 日历值 -> 槽位下标
    fn offset(&self, value: u32) -> u64 {
        (value - self.origin) as u64 % self.unit.slot_count()
    }

    /// 当前指针对应的槽位下标
    pub fn cursor_offset(&self) -> u64 {
        self.offset(self.cursor)
    }

    /// 指针 +1
    ///
    /// `limit` 是本层指针允许的最大日历值 (日轮按当月天数动态给出)。
    /// 越过上限时复位到本层最小值，返回 true 表示需要向上层进位。
    pub fn step(&mut self, limit: u32) -> bool {
        self.cursor += 1;
        if self.cursor > limit {
            self.cursor = match self.unit {
                TimeUnit::Month | TimeUnit::Day => 1,
                _ => 0,
            };
            return true;
        }
        false
    }

    /// 把任务放进指定槽位
    pub fn append(&mut self, pos: u64, task: Task) {
        self.sites.insert(task.id, pos);
        self.slots[pos as usize].push(task);
    }

    /// 取走当前指针槽位里的全部任务
    pub fn take_current(&mut self) -> Vec<Task> {
        let idx = self.cursor_offset() as usize;
        let list = mem::take(&mut self.slots[idx]);
        for task in &list {
            self.sites.remove(&task.id);
        }
        list
    }

    /// 按 id 删除尚未到期的任务；不在本层时返回 false
    pub fn remove(&mut self, id: u64) -> bool {
        match self.sites.remove(&id) {
            Some(pos) => {
                self.slots[pos as usize].retain(|t| t.id != id);
                true
            }
            None => false,
        }
    }

    /// 本层是否持有该任务 (测试用)
    #[cfg(test)]
    pub fn holds(&self, id: u64) -> bool {
        self.sites.contains_key(&id)
    }

    /// 本层任务总数 (测试用)
    #[cfg(test)]
    pub fn task_count(&self) -> usize {
        self.sites.len()
    }
}
