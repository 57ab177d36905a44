// 上传调度服务
//
// 负责把一个批次的 Pending 任务全部推进到终止状态：
// - 固定数量的逻辑 worker 并发扫描同一个共享队列
// - 认领 = 持任务锁完成"检查 Pending + 写入 Uploading"，对其它 worker 原子
// - 可选的去重预检查（SHA-1 摘要 + 服务端存在性校验）
// - 单任务的一切失败都转化为终止状态，批次本身不会失败
// - 聚合计数按需重新扫描队列，队列是唯一事实来源

use crate::gallery::{DuplicateValidator, UploadError, UploadMetadata, UploadTransport};
use crate::uploader::hashing::ContentHasher;
use crate::uploader::task::{TaskId, UploadTask, UploadTaskStatus, DUPLICATED_TEXT};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// 默认并发 worker 数
pub const DEFAULT_WORKERS_COUNT: usize = 4;

/// 状态更新回调
///
/// 每次任务状态变化（认领、终止）后调用一次，调用方通过计数器拉取进度。
/// 不同任务之间的调用顺序无保证，单个任务内保证先认领后终止
pub type StatusUpdateCallback = Arc<dyn Fn() + Send + Sync>;

/// 上传服务选项
///
/// workers_count 由调用方保证为正数，服务本身不做校验
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// 并发 worker 数上限
    pub workers_count: usize,
    /// 是否启用去重预检查
    pub avoid_duplication: bool,
    /// 是否把 upload_name 作为备注转发给服务端
    pub filename_as_comment: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            workers_count: DEFAULT_WORKERS_COUNT,
            avoid_duplication: false,
            filename_as_comment: false,
        }
    }
}

/// 聚合计数
///
/// 每次读取都从队列重新统计，不维护独立累计值，避免与任务状态漂移
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadCounts {
    /// 已完成任务数
    pub completed: usize,
    /// 失败任务数
    pub error: usize,
    /// 重复任务数
    pub duplicate: usize,
}

impl UploadCounts {
    /// 已结束任务数（三种终止状态之和）
    pub fn finished(&self) -> usize {
        self.completed + self.error + self.duplicate
    }

    fn tally<'a>(statuses: impl Iterator<Item = &'a UploadTaskStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                UploadTaskStatus::Complete => counts.completed += 1,
                UploadTaskStatus::Error(_) => counts.error += 1,
                UploadTaskStatus::Duplicate(_) => counts.duplicate += 1,
                UploadTaskStatus::Pending | UploadTaskStatus::Uploading => {}
            }
        }
        counts
    }
}

/// 认领快照
///
/// 认领时在锁内拷贝任务的只读字段，网络调用期间不持有任务锁
struct ClaimedTask {
    id: TaskId,
    local_path: PathBuf,
    upload_name: String,
    categories: String,
    starred: bool,
    skip_ocr: bool,
}

impl From<&UploadTask> for ClaimedTask {
    fn from(task: &UploadTask) -> Self {
        Self {
            id: task.id,
            local_path: task.local_path.clone(),
            upload_name: task.upload_name.clone(),
            categories: task.categories.clone(),
            starred: task.starred,
            skip_ocr: task.skip_ocr,
        }
    }
}

/// worker 共享上下文
struct WorkerContext {
    queue: Arc<Vec<Arc<Mutex<UploadTask>>>>,
    transport: Arc<dyn UploadTransport>,
    validator: Arc<dyn DuplicateValidator>,
    options: UploadOptions,
    status_callback: Option<StatusUpdateCallback>,
}

impl WorkerContext {
    fn notify(&self) {
        if let Some(callback) = &self.status_callback {
            callback();
        }
    }
}

/// 上传服务
///
/// 每个批次创建一个实例，upload() 返回后即可丢弃，不跨批次复用。
/// 队列在 worker 之间共享并原地更新，调用方可随时读取每个任务的状态
pub struct UploadService {
    queue: Arc<Vec<Arc<Mutex<UploadTask>>>>,
    transport: Arc<dyn UploadTransport>,
    validator: Arc<dyn DuplicateValidator>,
    options: UploadOptions,
    status_callback: Option<StatusUpdateCallback>,
}

impl UploadService {
    /// 创建上传服务
    ///
    /// 调用方应预先过滤掉已完成的任务（常见做法是取 Pending | Error
    /// 的任务并经 reset_for_retry 重置后组成新队列）
    pub fn new(
        queue: Vec<UploadTask>,
        transport: Arc<dyn UploadTransport>,
        validator: Arc<dyn DuplicateValidator>,
        options: UploadOptions,
    ) -> Self {
        let queue = Arc::new(
            queue
                .into_iter()
                .map(|task| Arc::new(Mutex::new(task)))
                .collect::<Vec<_>>(),
        );

        Self {
            queue,
            transport,
            validator,
            options,
            status_callback: None,
        }
    }

    /// 设置状态更新回调
    pub fn on_status_update(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.status_callback = Some(Arc::new(callback));
        self
    }

    /// 共享队列引用，供调用方重绘每个任务的状态
    pub fn queue(&self) -> Arc<Vec<Arc<Mutex<UploadTask>>>> {
        self.queue.clone()
    }

    /// 队列当前内容的拷贝
    pub async fn snapshot(&self) -> Vec<UploadTask> {
        let mut tasks = Vec::with_capacity(self.queue.len());
        for slot in self.queue.iter() {
            tasks.push(slot.lock().await.clone());
        }
        tasks
    }

    /// 聚合计数（重新扫描队列）
    pub async fn counts(&self) -> UploadCounts {
        let snapshot = self.snapshot().await;
        UploadCounts::tally(snapshot.iter().map(|task| &task.status))
    }

    pub async fn completed_tasks_count(&self) -> usize {
        self.counts().await.completed
    }

    pub async fn error_tasks_count(&self) -> usize {
        self.counts().await.error
    }

    pub async fn duplicate_tasks_count(&self) -> usize {
        self.counts().await.duplicate
    }

    pub async fn finished_tasks_count(&self) -> usize {
        self.counts().await.finished()
    }

    /// 执行整个批次的上传
    ///
    /// 所有 worker 扫描完队列后返回，此时每个被认领过的任务都处于终止状态。
    /// 单任务失败不会让批次失败，只有 worker 本身异常退出（panic）才返回 Err
    pub async fn upload(&self) -> Result<()> {
        let context = Arc::new(WorkerContext {
            queue: self.queue.clone(),
            transport: self.transport.clone(),
            validator: self.validator.clone(),
            options: self.options.clone(),
            status_callback: self.status_callback.clone(),
        });

        info!(
            "开始上传批次: {} 个任务, {} 个 worker, 去重={}",
            self.queue.len(),
            self.options.workers_count,
            self.options.avoid_duplication
        );

        let mut handles = Vec::with_capacity(self.options.workers_count);
        for worker_id in 0..self.options.workers_count {
            handles.push(tokio::spawn(Self::run_worker(context.clone(), worker_id)));
        }

        for handle in handles {
            handle.await.context("上传 worker 异常退出")?;
        }

        let counts = self.counts().await;
        info!(
            "上传批次结束: 完成 {}, 失败 {}, 重复 {}",
            counts.completed, counts.error, counts.duplicate
        );

        Ok(())
    }

    /// 单个 worker 的扫描循环
    ///
    /// 每个 worker 都从头遍历同一个队列，跳过不再是 Pending 的任务，
    /// 谁先对某个下标完成认领谁就处理它，worker 之间不划分下标区间
    async fn run_worker(context: Arc<WorkerContext>, worker_id: usize) {
        for slot in context.queue.iter() {
            let claimed = {
                let mut task = slot.lock().await;
                if !task.status.is_pending() {
                    // 已被其它 worker 认领，或本来就处于终止状态
                    continue;
                }
                // 检查与写入在同一次持锁内完成，认领对其它 worker 原子可见
                task.mark_uploading();
                ClaimedTask::from(&*task)
            };

            debug!(
                "[worker {}] 认领任务 {} ({})",
                worker_id, claimed.id, claimed.upload_name
            );
            context.notify();

            let outcome = Self::process_claimed(&context, &claimed).await;

            match &outcome {
                UploadTaskStatus::Complete => {
                    info!("[worker {}] 任务 {} 上传成功", worker_id, claimed.id);
                }
                UploadTaskStatus::Duplicate(_) => {
                    info!("[worker {}] 任务 {} 内容重复，已跳过", worker_id, claimed.id);
                }
                UploadTaskStatus::Error(message) => {
                    warn!(
                        "[worker {}] 任务 {} 上传失败: {}",
                        worker_id, claimed.id, message
                    );
                }
                // process_claimed 只返回终止状态
                _ => {}
            }

            {
                let mut task = slot.lock().await;
                task.status = outcome;
            }
            context.notify();
        }
    }

    /// 处理一个已认领的任务，返回终止状态
    async fn process_claimed(context: &WorkerContext, claimed: &ClaimedTask) -> UploadTaskStatus {
        if context.options.avoid_duplication {
            match Self::check_duplicate(context, claimed).await {
                Ok(true) => {
                    // 预检查命中，不再发起上传
                    return UploadTaskStatus::Duplicate(DUPLICATED_TEXT.to_string());
                }
                Ok(false) => {}
                // 预检查本身失败按上传失败分类，不能当作"不重复"继续
                Err(err) => return Self::status_from_error(err),
            }
        }

        let metadata = UploadMetadata {
            local: true,
            starred: claimed.starred,
            skip_ocr: claimed.skip_ocr,
            categories: claimed.categories.clone(),
            comment: context
                .options
                .filename_as_comment
                .then(|| claimed.upload_name.clone()),
        };

        match context.transport.upload(&claimed.local_path, &metadata).await {
            Ok(()) => UploadTaskStatus::Complete,
            Err(err) => Self::status_from_error(err),
        }
    }

    /// 去重预检查：计算摘要并以单元素批次调用校验接口
    async fn check_duplicate(
        context: &WorkerContext,
        claimed: &ClaimedTask,
    ) -> Result<bool, UploadError> {
        let digest = ContentHasher::compute_digest(&claimed.local_path)
            .await
            .map_err(|e| UploadError::Internal(format!("计算摘要失败: {:#}", e)))?;

        let exists = context
            .validator
            .validate(std::slice::from_ref(&digest))
            .await?;

        Ok(exists.first().copied().unwrap_or(false))
    }

    /// 把分类错误转成终止状态
    fn status_from_error(err: UploadError) -> UploadTaskStatus {
        if let UploadError::Internal(detail) = &err {
            error!("任务内部错误: {}", detail);
        }

        if err.is_duplicate() {
            UploadTaskStatus::Duplicate(err.to_string())
        } else {
            UploadTaskStatus::Error(err.to_string())
        }
    }
}
