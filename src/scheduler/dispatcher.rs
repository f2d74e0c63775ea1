use tracing::trace;

use crate::common::model::Task;

/// 派发到期任务
///
/// 每个包装任务拉起一个独立的 tokio 任务执行，发射后不管：
/// 回调再慢、甚至 panic，都只影响它自己那个任务，堵不住事件循环，
/// 也不会推迟后续的 tick。
pub(crate) fn dispatch(due: Vec<Task>) {
    for task in due {
        trace!(
            task_id = task.id,
            job = task.job.display_name(),
            "任务到期, 派发执行"
        );
        tokio::spawn(task.job.fire());
    }
}
