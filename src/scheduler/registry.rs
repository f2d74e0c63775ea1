use std::sync::Arc;

use dashmap::DashSet;
use rand::Rng;

/// 存活任务 id 集合
///
/// 前端在提交时登记、取消时摘除；一次性任务触发时由包装器摘除。
/// `cancel` 先在这里做无锁的成员检查，未知 id 不会惊动事件循环。
#[derive(Clone, Default)]
pub(crate) struct TaskRegistry {
    live: Arc<DashSet<u64>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配一个未占用的随机 63 位任务 id 并登记
    pub fn allocate(&self) -> u64 {
        let mut rng = rand::rng();
        loop {
            let id: u64 = rng.random_range(1..=i64::MAX as u64);
            if self.live.insert(id) {
                return id;
            }
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.live.contains(&id)
    }

    /// 摘除 id；本来就不存在时返回 false
    pub fn release(&self, id: u64) -> bool {
        self.live.remove(&id).is_some()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.live.len()
    }
}
