use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::common::error::{Result, SchedulerError};

/// 调度视界：最长可调度十年，再远的任务年轮放不下
pub const HORIZON_SECS: i64 = 10 * 365 * 24 * 3600;

// ==========================================
// 1. 日历刻度 (TimeUnit)
// ==========================================

/// 时间轮的六个刻度层级，由粗到细
///
/// 每个刻度对应一层轮盘；`Second` 是默认的最细层，也是真正触发任务的一层。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl TimeUnit {
    /// 全部刻度，下标即 `index()`
    pub const ALL: [TimeUnit; 6] = [
        TimeUnit::Year,
        TimeUnit::Month,
        TimeUnit::Day,
        TimeUnit::Hour,
        TimeUnit::Minute,
        TimeUnit::Second,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// 本层轮盘的槽数
    ///
    /// 日轮的 31 是物理上限；当月的有效槽数由 (年, 月) 决定，
    /// 见 `days_in_month`。
    pub fn slot_count(self) -> u64 {
        match self {
            TimeUnit::Year => 10,
            TimeUnit::Month => 12,
            TimeUnit::Day => 31,
            TimeUnit::Hour => 24,
            TimeUnit::Minute => 60,
            TimeUnit::Second => 60,
        }
    }

    /// 周期表达式步进展开时的取值区间 (闭区间)
    pub fn range(self) -> (u32, u32) {
        match self {
            TimeUnit::Year => (2021, 2031),
            TimeUnit::Month => (1, 12),
            TimeUnit::Day => (1, 31),
            TimeUnit::Hour => (0, 23),
            TimeUnit::Minute => (0, 59),
            TimeUnit::Second => (0, 59),
        }
    }

    /// 一个刻度单位折合的秒数
    ///
    /// 月与年没有固定长度，取标称值 (30 天 / 365 天)，只用于
    /// 粗粒度模式下的延迟换算；秒级粒度不受影响。
    pub fn unit_seconds(self) -> i64 {
        match self {
            TimeUnit::Year => 365 * 86_400,
            TimeUnit::Month => 30 * 86_400,
            TimeUnit::Day => 86_400,
            TimeUnit::Hour => 3_600,
            TimeUnit::Minute => 60,
            TimeUnit::Second => 1,
        }
    }

    /// 上一层 (更粗) 的刻度
    pub fn coarser(self) -> Option<TimeUnit> {
        match self {
            TimeUnit::Year => None,
            other => Some(Self::ALL[other.index() - 1]),
        }
    }

    /// 下一层 (更细) 的刻度
    pub fn finer(self) -> Option<TimeUnit> {
        match self {
            TimeUnit::Second => None,
            other => Some(Self::ALL[other.index() + 1]),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeUnit::Year => "year",
            TimeUnit::Month => "month",
            TimeUnit::Day => "day",
            TimeUnit::Hour => "hour",
            TimeUnit::Minute => "minute",
            TimeUnit::Second => "second",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimeUnit {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "year" => Ok(TimeUnit::Year),
            "month" => Ok(TimeUnit::Month),
            "day" => Ok(TimeUnit::Day),
            "hour" => Ok(TimeUnit::Hour),
            "minute" => Ok(TimeUnit::Minute),
            "second" => Ok(TimeUnit::Second),
            other => Err(SchedulerError::UnknownField(other.to_string())),
        }
    }
}

// ==========================================
// 2. 日历基础运算
// ==========================================

/// 闰年判定
pub fn is_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// 指定月份的天数 (月份从 1 开始计数)
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap(year) {
                29
            } else {
                28
            }
        }
    }
}

// ==========================================
// 3. 日历时间元组 (CalendarTime)
// ==========================================

/// (年, 月, 日, 时, 分, 秒) 元组
///
/// 表盘时间与周期计算都用它表示；不带时区，语义上是本地时间。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl CalendarTime {
    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// 取当前本地挂钟时间，用于启动时对齐表盘指针
    pub fn now_local() -> Self {
        let now = Local::now();
        Self {
            year: now.year(),
            month: now.month(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
            second: now.second(),
        }
    }

    /// 解析 `YYYY-MM-DD HH:MM:SS` 格式 (本地时间)
    pub fn parse(text: &str) -> Result<Self> {
        let dt = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| SchedulerError::BadSpec(format!("timestamp '{}': {}", text, e)))?;
        Ok(Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        })
    }

    pub fn get(&self, unit: TimeUnit) -> u32 {
        match unit {
            TimeUnit::Year => self.year as u32,
            TimeUnit::Month => self.month,
            TimeUnit::Day => self.day,
            TimeUnit::Hour => self.hour,
            TimeUnit::Minute => self.minute,
            TimeUnit::Second => self.second,
        }
    }

    pub fn set(&mut self, unit: TimeUnit, value: u32) {
        match unit {
            TimeUnit::Year => self.year = value as i32,
            TimeUnit::Month => self.month = value,
            TimeUnit::Day => self.day = value,
            TimeUnit::Hour => self.hour = value,
            TimeUnit::Minute => self.minute = value,
            TimeUnit::Second => self.second = value,
        }
    }

    /// 指定刻度 +1，溢出时复位到该刻度的最小值并向更粗一层进位
    ///
    /// 年没有溢出策略：调度器生命周期内不会用尽。
    pub fn add_one(&mut self, unit: TimeUnit) {
        match unit {
            TimeUnit::Year => self.year += 1,
            TimeUnit::Month => {
                self.month += 1;
                if self.month == 13 {
                    self.month = 1;
                    self.add_one(TimeUnit::Year);
                }
            }
            TimeUnit::Day => {
                self.day += 1;
                if self.day == days_in_month(self.year, self.month) + 1 {
                    self.day = 1;
                    self.add_one(TimeUnit::Month);
                }
            }
            TimeUnit::Hour => {
                self.hour += 1;
                if self.hour == 24 {
                    self.hour = 0;
                    self.add_one(TimeUnit::Day);
                }
            }
            TimeUnit::Minute => {
                self.minute += 1;
                if self.minute == 60 {
                    self.minute = 0;
                    self.add_one(TimeUnit::Hour);
                }
            }
            TimeUnit::Second => {
                self.second += 1;
                if self.second == 60 {
                    self.second = 0;
                    self.add_one(TimeUnit::Minute);
                }
            }
        }
    }

    /// 把越过月末的日期进位到下一个月
    ///
    /// 周期表达式允许 Day 超过目标月份的实际天数 (例如非闰年的 2 月 29 日)，
    /// 在换算秒差之前先规整：2 月 30 日 -> 3 月 2 日。
    pub fn normalized(mut self) -> Self {
        let mut dim = days_in_month(self.year, self.month);
        while self.day > dim {
            self.day -= dim;
            self.add_one(TimeUnit::Month);
            dim = days_in_month(self.year, self.month);
        }
        self
    }

    /// 自 1970-01-01 起的天序号
    fn day_ordinal(&self) -> i64 {
        let mut days: i64 = 0;
        for y in 1970..self.year {
            days += if is_leap(y) { 366 } else { 365 };
        }
        for m in 1..self.month {
            days += days_in_month(self.year, m) as i64;
        }
        days + self.day as i64 - 1
    }

    fn hms_seconds(&self) -> i64 {
        self.hour as i64 * 3_600 + self.minute as i64 * 60 + self.second as i64
    }

    /// `self - earlier` 的秒差
    ///
    /// 统一公式：天序号差 * 86400 + 时分秒差。两端先做月末规整。
    pub fn delta_seconds(&self, earlier: &CalendarTime) -> i64 {
        let a = self.normalized();
        let b = earlier.normalized();
        (a.day_ordinal() - b.day_ordinal()) * 86_400 + a.hms_seconds() - b.hms_seconds()
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leap_year_rules() {
        assert!(is_leap(2024));
        assert!(is_leap(2000));
        assert!(!is_leap(1900));
        assert!(!is_leap(2023));
    }

    #[test]
    fn february_lengths() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2021, 12), 31);
        assert_eq!(days_in_month(2021, 11), 30);
    }

    #[test]
    fn add_one_carries_through_fields() {
        let mut t = CalendarTime::new(2021, 12, 31, 23, 59, 59);
        t.add_one(TimeUnit::Second);
        assert_eq!(t, CalendarTime::new(2022, 1, 1, 0, 0, 0));

        let mut t = CalendarTime::new(2024, 2, 28, 10, 0, 0);
        t.add_one(TimeUnit::Day);
        assert_eq!(t.day, 29, "闰年 2 月有 29 天");
        t.add_one(TimeUnit::Day);
        assert_eq!((t.month, t.day), (3, 1));
    }

    #[test]
    fn normalized_rolls_day_overflow_into_next_month() {
        let t = CalendarTime::new(2023, 2, 30, 8, 0, 0).normalized();
        assert_eq!((t.month, t.day), (3, 2));

        let t = CalendarTime::new(2024, 2, 29, 8, 0, 0).normalized();
        assert_eq!((t.month, t.day), (2, 29));
    }

    #[test]
    fn delta_seconds_basic() {
        let a = CalendarTime::new(2021, 9, 1, 13, 0, 0);
        let b = CalendarTime::new(2021, 9, 1, 12, 0, 0);
        assert_eq!(a.delta_seconds(&b), 3_600);
    }

    #[test]
    fn delta_seconds_with_hms_borrow() {
        // 目标的时分秒比当前早，需要向天借位
        let a = CalendarTime::new(2021, 9, 2, 0, 0, 10);
        let b = CalendarTime::new(2021, 9, 1, 23, 59, 50);
        assert_eq!(a.delta_seconds(&b), 20);
    }

    #[test]
    fn delta_seconds_across_leap_february() {
        let a = CalendarTime::new(2024, 3, 1, 0, 0, 0);
        let b = CalendarTime::new(2024, 2, 1, 0, 0, 0);
        assert_eq!(a.delta_seconds(&b), 29 * 86_400);

        let a = CalendarTime::new(2023, 3, 1, 0, 0, 0);
        let b = CalendarTime::new(2023, 2, 1, 0, 0, 0);
        assert_eq!(a.delta_seconds(&b), 28 * 86_400);
    }

    #[test]
    fn parse_and_display_round_trip() {
        let t = CalendarTime::parse("2021-09-01 12:00:00").unwrap();
        assert_eq!(t, CalendarTime::new(2021, 9, 1, 12, 0, 0));
        assert_eq!(t.to_string(), "2021-09-01 12:00:00");

        assert!(CalendarTime::parse("2021-13-01 12:00:00").is_err());
        assert!(CalendarTime::parse("not a time").is_err());
    }

    #[test]
    fn unit_name_round_trip() {
        for unit in TimeUnit::ALL {
            assert_eq!(unit.name().parse::<TimeUnit>().unwrap(), unit);
        }
        assert!(matches!(
            "millisecond".parse::<TimeUnit>(),
            Err(SchedulerError::UnknownField(_))
        ));
    }
}
