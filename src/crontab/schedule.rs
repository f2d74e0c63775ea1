use serde::{Deserialize, Serialize};

use crate::common::error::Result;
use crate::common::time::{CalendarTime, TimeUnit};
use crate::crontab::parser::parse_field;

/// 周期时刻表 (cron 风格)
///
/// 每个日历字段一个文本表达式，文法见 `parser`；空串表示不约束。
///
/// ```
/// use kairos::RecurrenceSpec;
///
/// // 每分钟的 00,05,...,55 秒各执行一次
/// let spec = RecurrenceSpec {
///     second: "/5".into(),
///     ..Default::default()
/// };
/// # let _ = spec;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceSpec {
    pub second: String,
    pub minute: String,
    pub hour: String,
    pub day: String,
    pub month: String,
    pub year: String,
}

impl RecurrenceSpec {
    fn field(&self, unit: TimeUnit) -> &str {
        match unit {
            TimeUnit::Year => &self.year,
            TimeUnit::Month => &self.month,
            TimeUnit::Day => &self.day,
            TimeUnit::Hour => &self.hour,
            TimeUnit::Minute => &self.minute,
            TimeUnit::Second => &self.second,
        }
    }

    /// 按字段名写入表达式，名字必须是六个刻度之一
    pub fn set(&mut self, field: &str, expr: impl Into<String>) -> Result<()> {
        let unit: TimeUnit = field.parse()?;
        let slot = match unit {
            TimeUnit::Year => &mut self.year,
            TimeUnit::Month => &mut self.month,
            TimeUnit::Day => &mut self.day,
            TimeUnit::Hour => &mut self.hour,
            TimeUnit::Minute => &mut self.minute,
            TimeUnit::Second => &mut self.second,
        };
        *slot = expr.into();
        Ok(())
    }
}

/// 编译后的周期表
///
/// `allowed[i]` 与 `TimeUnit::ALL[i]` 对齐，`None` 为不约束；
/// `last_fired` 记录上一次算出的触发时刻，用来打破 "同一瞬间" 的平局。
pub(crate) struct Recurrence {
    allowed: [Option<Vec<u32>>; 6],
    last_fired: Option<CalendarTime>,
}

impl Recurrence {
    /// 在调度时编译全部字段；任何畸形表达式同步返回 BadSpec
    pub fn compile(spec: &RecurrenceSpec) -> Result<Self> {
        let mut allowed: [Option<Vec<u32>>; 6] = Default::default();
        for unit in TimeUnit::ALL {
            allowed[unit.index()] = parse_field(spec.field(unit), unit)?;
        }
        Ok(Self {
            allowed,
            last_fired: None,
        })
    }

    fn is_unconstrained(&self) -> bool {
        self.allowed.iter().all(|field| field.is_none())
    }

    /// 距离下一次触发的秒数
    ///
    /// 完全不约束的表按固定 60 秒的周期走；否则按字段扫描出
    /// 绝对时刻，再对表盘时间求差。负数表示允许值已经用尽
    /// (例如年份列表整体落在过去)，由调用方判定丢弃。
    pub fn next_delay(&mut self, now: CalendarTime) -> i64 {
        if self.is_unconstrained() {
            return 60;
        }
        let target = self.next_fire(now);
        target.delta_seconds(&now)
    }

    /// 由粗到细挑选每个字段最近的允许值
    ///
    /// 某个字段一旦越过了 now (选中更大的允许值或发生进位)，更细的受约束
    /// 字段直接取各自最小的允许值；不受约束的字段始终沿用 now 的值。
    /// 细字段的进位可能把已经定下的粗字段顶出允许集 (例如秒进位让分钟
    /// 从 30 变成 31)，这时以算出的时刻为新基准重扫，直到全部约束成立。
    pub fn next_fire(&mut self, now: CalendarTime) -> CalendarTime {
        let mut probe = now;
        if self.last_fired == Some(now) {
            // 连续两次在同一瞬间求值：推进一秒，保证触发序列严格递增
            probe.add_one(TimeUnit::Second);
        }

        loop {
            let out = self.scan(probe);
            if self.satisfies(&out) {
                self.last_fired = Some(out);
                return out;
            }
            // 每次重扫都严格后移，年字段用尽时落在过去并立即收敛,
            // 不存在死循环
            probe = out;
        }
    }

    /// 单趟字段扫描
    fn scan(&self, probe: CalendarTime) -> CalendarTime {
        let mut out = probe;
        let mut jumped = false;
        for unit in TimeUnit::ALL {
            let values = match &self.allowed[unit.index()] {
                None => continue, // 不约束：沿用 probe 的值
                Some(values) => values,
            };
            if jumped {
                out.set(unit, values[0]);
                continue;
            }
            let current = probe.get(unit);
            match values.iter().copied().find(|&v| v >= current) {
                Some(v) => {
                    out.set(unit, v);
                    if v > current {
                        jumped = true;
                    }
                }
                None => {
                    out.set(unit, values[0]);
                    if let Some(coarser) = unit.coarser() {
                        out.add_one(coarser);
                    }
                    jumped = true;
                }
            }
        }
        out
    }

    /// 受约束的字段是否全部落在允许集内
    fn satisfies(&self, t: &CalendarTime) -> bool {
        TimeUnit::ALL.iter().all(|&unit| {
            match &self.allowed[unit.index()] {
                None => true,
                Some(values) => values.contains(&t.get(unit)),
            }
        })
    }
}
