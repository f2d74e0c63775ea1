use crate::common::error::{Result, SchedulerError};
use crate::common::model::Task;
use crate::common::time::{days_in_month, CalendarTime, TimeUnit};
use crate::wheel::level::WheelLevel;

/// 六层联动的时间轮
///
/// `levels[0]` 固定是年轮，向下直到配置的最细粒度层；相邻层级用数组
/// 下标互指 (`idx - 1` 为上层, `idx + 1` 为下层)，不存在指针环。
/// 所有方法都只在事件循环的任务上调用，无需加锁。
pub(crate) struct WheelStack {
    levels: Vec<WheelLevel>,
    /// 启动对齐时刻；细于粒度层的字段在 `now()` 里保持冻结
    origin: CalendarTime,
}

impl WheelStack {
    /// 从年轮建到 `granularity` 层，指针按 `origin` 对齐
    pub fn new(granularity: TimeUnit, origin: CalendarTime) -> Self {
        let mut levels = Vec::new();
        for unit in TimeUnit::ALL {
            levels.push(WheelLevel::new(unit, origin.get(unit)));
            if unit == granularity {
                break;
            }
        }
        Self { levels, origin }
    }

    /// 最细一层的下标，只有它真正触发任务
    #[inline]
    fn bottom(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn granularity(&self) -> TimeUnit {
        self.levels[self.bottom()].unit()
    }

    /// 当前表盘时间
    pub fn now(&self) -> CalendarTime {
        let mut now = self.origin;
        for level in &self.levels {
            now.set(level.unit(), level.cursor());
        }
        now
    }

    /// 本层指针允许的最大日历值
    ///
    /// 日轮的上限随 (年, 月) 指针变化，必须在上层进位之前读取。
    fn cursor_limit(&self, idx: usize) -> u32 {
        match self.levels[idx].unit() {
            TimeUnit::Year => u32::MAX,
            TimeUnit::Month => 12,
            TimeUnit::Day => {
                let year = self.levels[0].cursor() as i32;
                let month = self.levels[1].cursor();
                days_in_month(year, month)
            }
            TimeUnit::Hour => 23,
            TimeUnit::Minute | TimeUnit::Second => 59,
        }
    }

    /// 本层参与取模的有效槽数 (日轮同样取当月天数)
    fn slot_span(&self, idx: usize) -> u64 {
        match self.levels[idx].unit() {
            TimeUnit::Day => {
                let year = self.levels[0].cursor() as i32;
                let month = self.levels[1].cursor();
                days_in_month(year, month) as u64
            }
            unit => unit.slot_count(),
        }
    }

    /// 新任务入轮
    ///
    /// 从最细层开始逐层做 模/除 换算：余数叠加当前指针得到本层槽位，
    /// 商作为剩余延迟交给上一层。商归零的那一层就是任务的落点；
    /// 槽位恰好等于当前指针时任务已经到期，交还给调用方立即派发。
    pub fn insert(&mut self, mut task: Task) -> Result<Option<Task>> {
        let mut idx = self.bottom();
        loop {
            let span = self.slot_span(idx);
            let cursor = self.levels[idx].cursor_offset();
            let mut pos = task.remaining % span;
            let mut carry = task.remaining / span;
            if pos + cursor >= span {
                carry += 1;
                pos = pos + cursor - span;
            } else {
                pos += cursor;
            }
            task.remaining = carry;
            task.sites[self.levels[idx].unit().index()] = Some(pos);

            if carry != 0 {
                if idx == 0 {
                    // 前端已经按十年视界校验过，走到这里说明校验被绕开了
                    return Err(SchedulerError::Internal(format!(
                        "task {} overflows the year wheel",
                        task.id
                    )));
                }
                idx -= 1;
                continue;
            }

            if pos == cursor {
                return Ok(Some(task));
            }
            self.levels[idx].append(pos, task);
            return Ok(None);
        }
    }

    /// 指针步进一格，返回所有到期任务
    pub fn tick(&mut self) -> Vec<Task> {
        let mut due = Vec::new();
        self.advance(self.bottom(), &mut due);
        due
    }

    /// 推进第 `idx` 层
    ///
    /// 进位时先推上层再处理本层槽位：这样上层分发下来的任务
    /// (包括正好落在新指针上的) 会在同一个 tick 里被拾起。
    fn advance(&mut self, idx: usize, due: &mut Vec<Task>) {
        let limit = self.cursor_limit(idx);
        let wrapped = self.levels[idx].step(limit);
        if wrapped && idx > 0 {
            self.advance(idx - 1, due);
        }

        let list = self.levels[idx].take_current();
        if idx == self.bottom() {
            due.extend(list);
            return;
        }

        // 向下层分发；没有下层落点记录的任务已经到期
        let child = idx + 1;
        for task in list {
            match task.sites[self.levels[child].unit().index()] {
                Some(pos) => self.levels[child].append(pos, task),
                None => due.push(task),
            }
        }
    }

    /// 自上而下找到持有该任务的层级并删除
    pub fn remove(&mut self, id: u64) -> bool {
        for level in self.levels.iter_mut() {
            if level.remove(id) {
                return true;
            }
        }
        false
    }

    /// 任务当前停留的层级 (测试用)
    #[cfg(test)]
    pub fn holding_level(&self, id: u64) -> Option<TimeUnit> {
        self.levels
            .iter()
            .find(|level| level.holds(id))
            .map(|level| level.unit())
    }

    /// 全轮任务总数 (测试用)
    #[cfg(test)]
    pub fn task_count(&self) -> usize {
        self.levels.iter().map(|level| level.task_count()).sum()
    }
}
