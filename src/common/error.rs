use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

/// 调度器统一结果类型
///
/// 使用此别名可以简化函数签名：`fn do_something() -> Result<()>`
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// 配置错误
    ///
    /// - 触发场景: 构建时参数校验不通过，例如 tick 间隔与刻度粒度不一致、通道容量为 0。
    /// - 后果: `build()` 失败，调度器不会启动。
    /// - 处理: 检查 `WheelConfig`。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 时刻表达式非法 (BadSpec)
    ///
    /// - 触发场景: 一次性任务的时间戳字符串无法按 `YYYY-MM-DD HH:MM:SS` 解析，
    ///   或者周期任务的某个字段表达式不符合 字面量/列表/区间/步进 文法，
    ///   或者表达式展开后不存在任何未来的执行时刻。
    /// - 后果: 请求被拒绝，任务不会入轮。
    #[error("Bad schedule spec: {0}")]
    BadSpec(String),

    /// 超出调度视界 (OutOfHorizon)
    ///
    /// - 触发场景: 计算出的延迟超过十年 (10 * 365 * 24 * 3600 秒)。
    /// - 后果: 请求被拒绝。年轮只有十个刻度，放不下更远的任务。
    #[error("Delay of {0}s exceeds the 10-year scheduling horizon.")]
    OutOfHorizon(i64),

    /// 未知的日历刻度名
    ///
    /// - 触发场景: 按名字引用刻度时给出了 year/month/day/hour/minute/second 之外的值。
    #[error("Unknown calendar field: {0}")]
    UnknownField(String),

    /// 调度器已停机
    ///
    /// - 触发场景: 在调用 `stop()` 之后仍有客户端尝试提交新任务，
    ///   或者事件循环一侧的接收端已被 Drop。
    /// - 后果: 请求被拒绝。
    #[error("Scheduler is stopped, rejecting new tasks.")]
    Shutdown,

    /// 内部不变量被破坏
    ///
    /// - 触发场景: 绕过前端校验的任务在级联插入时溢出年轮。
    /// - 后果: 这是一个严重的程序 Bug，事件循环会就地终止。
    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

// 自动转换 Tokio MPSC 发送错误
impl<T> From<SendError<T>> for SchedulerError {
    fn from(_: SendError<T>) -> Self {
        SchedulerError::Shutdown
    }
}
