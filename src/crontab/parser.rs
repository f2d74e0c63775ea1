use crate::common::error::{Result, SchedulerError};
use crate::common::time::TimeUnit;

/// 解析一个字段的时刻表达式
///
/// 文法 (逗号分隔的子表达式取并集)：
/// - 空串    -> 字段不约束，返回 None
/// - `N`     -> 字面量
/// - `a-b`   -> 闭区间
/// - `/k`    -> 字段全区间内能被 k 整除的时刻
/// - `a-b/k` -> 区间内能被 k 整除的时刻
///
/// 输出升序去重；任何畸形输入都在这里变成 `BadSpec`，不会流进时间轮。
pub(crate) fn parse_field(text: &str, unit: TimeUnit) -> Result<Option<Vec<u32>>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let mut values = Vec::new();
    for part in text.split(',') {
        expand(part.trim(), unit, &mut values)?;
    }
    if values.is_empty() {
        return Err(bad(unit, text, "no usable instant"));
    }
    values.sort_unstable();
    values.dedup();
    Ok(Some(values))
}

fn expand(part: &str, unit: TimeUnit, out: &mut Vec<u32>) -> Result<()> {
    if part.is_empty() {
        return Err(bad(unit, part, "empty subexpression"));
    }

    match part.split_once('/') {
        // `/k` 或 `a-b/k`
        Some((range, step)) => {
            let k = number(step, unit)?;
            if k == 0 {
                return Err(bad(unit, part, "step must be positive"));
            }
            let (a, b) = if range.is_empty() {
                unit.range()
            } else {
                bounds(range, unit)?
            };
            out.extend((a..=b).filter(|v| v % k == 0));
        }
        None => match part.split_once('-') {
            Some(_) => {
                let (a, b) = bounds(part, unit)?;
                out.extend(a..=b);
            }
            None => out.push(literal(part, unit)?),
        },
    }
    Ok(())
}

/// `a-b` 两端都要落在字段区间内且不反向
fn bounds(range: &str, unit: TimeUnit) -> Result<(u32, u32)> {
    let (a, b) = range
        .split_once('-')
        .ok_or_else(|| bad(unit, range, "step needs a range like a-b/k"))?;
    let a = literal(a, unit)?;
    let b = literal(b, unit)?;
    if a > b {
        return Err(bad(unit, range, "reversed range"));
    }
    Ok((a, b))
}

fn literal(text: &str, unit: TimeUnit) -> Result<u32> {
    let value = number(text, unit)?;
    let (lo, hi) = unit.range();
    if value < lo || value > hi {
        return Err(bad(unit, text, "value out of field range"));
    }
    Ok(value)
}

fn number(text: &str, unit: TimeUnit) -> Result<u32> {
    text.parse::<u32>()
        .map_err(|_| bad(unit, text, "expected a number"))
}

fn bad(unit: TimeUnit, text: &str, reason: &str) -> SchedulerError {
    SchedulerError::BadSpec(format!("{} field '{}': {}", unit, text, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(text: &str) -> Result<Option<Vec<u32>>> {
        parse_field(text, TimeUnit::Second)
    }

    #[test]
    fn empty_means_wildcard() {
        assert_eq!(seconds("").unwrap(), None);
        assert_eq!(seconds("   ").unwrap(), None);
    }

    #[test]
    fn literal_and_list() {
        assert_eq!(seconds("30").unwrap(), Some(vec![30]));
        assert_eq!(seconds("12,10,11").unwrap(), Some(vec![10, 11, 12]));
    }

    #[test]
    fn range_expansion() {
        assert_eq!(seconds("10-12").unwrap(), Some(vec![10, 11, 12]));
    }

    #[test]
    fn step_over_full_range() {
        let values = seconds("/15").unwrap().unwrap();
        assert_eq!(values, vec![0, 15, 30, 45]);

        // 年的区间是 2021-2031
        let years = parse_field("/2", TimeUnit::Year).unwrap().unwrap();
        assert_eq!(years, vec![2022, 2024, 2026, 2028, 2030]);
    }

    #[test]
    fn range_with_step_matches_the_divisibility_set() {
        // "a-b/k" 展开后恰好是 { x in [a,b] : x % k == 0 }
        let values = seconds("10-20/5").unwrap().unwrap();
        let expected: Vec<u32> = (10..=20).filter(|v| v % 5 == 0).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn overlapping_subexpressions_are_deduplicated() {
        assert_eq!(seconds("1-3,2-4,3").unwrap(), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn malformed_specs_are_rejected() {
        assert!(seconds("5x").is_err());
        assert!(seconds("61").is_err(), "超出秒的取值区间");
        assert!(seconds("8-3").is_err(), "反向区间");
        assert!(seconds("/0").is_err(), "步长为零");
        assert!(seconds("5/2").is_err(), "步长前只能是区间或空");
        assert!(seconds("1,,2").is_err(), "空子表达式");
        assert!(seconds("1-3/7").is_err(), "区间内没有可整除的时刻");
        assert!(parse_field("0", TimeUnit::Day).is_err(), "日从 1 开始");
    }
}
