// 上传任务定义
//
// 任务 ID 由注入的 TaskIdGenerator 分配（进程内单调递增，永不复用），
// 避免进程级静态计数器在测试间泄漏状态

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// 重复任务的固定错误文案
pub const DUPLICATED_TEXT: &str = "Duplicated";

/// 任务唯一标识
///
/// 同一个生成器发出的 ID 单调递增，整个生命周期内唯一标识一个任务，
/// 重试副本保留原 ID（界面列表 key 依赖身份连续性）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 任务 ID 生成器
///
/// 由构建任务队列的一方持有并注入，不使用全局静态计数器
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next: AtomicU64,
}

impl TaskIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配下一个 ID
    pub fn next_id(&self) -> TaskId {
        TaskId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// 上传任务状态
///
/// 状态机: Pending -> Uploading -> {Complete, Error, Duplicate}
/// 终止状态携带错误文案，Complete 不携带，非法组合在类型上不可表达
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "message")]
pub enum UploadTaskStatus {
    /// 等待中
    Pending,
    /// 上传中（已被某个 worker 认领）
    Uploading,
    /// 已完成
    Complete,
    /// 失败
    Error(String),
    /// 重复（去重预检查命中，或服务端返回冲突）
    Duplicate(String),
}

impl UploadTaskStatus {
    /// 是否为终止状态（一个批次内不会再发生迁移）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadTaskStatus::Complete | UploadTaskStatus::Error(_) | UploadTaskStatus::Duplicate(_)
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, UploadTaskStatus::Pending)
    }

    /// 错误文案，仅 Error / Duplicate 状态有意义
    pub fn error_text(&self) -> Option<&str> {
        match self {
            UploadTaskStatus::Error(message) | UploadTaskStatus::Duplicate(message) => {
                Some(message)
            }
            _ => None,
        }
    }
}

/// 上传任务
///
/// 一个文件对应一个任务。除 status 外的字段在上传开始后不再变化，
/// upload_name 在构造时由文件名（或相对路径）推导，之后不重新推导
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    /// 任务 ID
    pub id: TaskId,
    /// 本地文件路径
    pub local_path: PathBuf,
    /// 展示/标识名称
    pub upload_name: String,
    /// 分类标签（逗号分隔的自由文本）
    pub categories: String,
    /// 是否星标
    pub starred: bool,
    /// 是否跳过 OCR
    pub skip_ocr: bool,
    /// 界面选中标记，调度器不解释该字段
    #[serde(default)]
    pub selected: bool,
    /// 当前状态
    pub status: UploadTaskStatus,
}

impl UploadTask {
    /// 创建新任务，名称取文件名
    pub fn new(ids: &TaskIdGenerator, local_path: PathBuf) -> Self {
        let upload_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::with_name(ids, local_path, upload_name)
    }

    /// 创建新任务，使用自定义名称（目录上传时传相对路径）
    pub fn with_name(ids: &TaskIdGenerator, local_path: PathBuf, upload_name: String) -> Self {
        Self {
            id: ids.next_id(),
            local_path,
            upload_name,
            categories: String::new(),
            starred: false,
            skip_ocr: false,
            selected: false,
            status: UploadTaskStatus::Pending,
        }
    }

    /// 标记为上传中
    pub fn mark_uploading(&mut self) {
        self.status = UploadTaskStatus::Uploading;
    }

    /// 标记为已完成
    pub fn mark_complete(&mut self) {
        self.status = UploadTaskStatus::Complete;
    }

    /// 标记为失败
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = UploadTaskStatus::Error(message.into());
    }

    /// 标记为重复
    pub fn mark_duplicate(&mut self) {
        self.status = UploadTaskStatus::Duplicate(DUPLICATED_TEXT.to_string());
    }

    /// 生成重试副本：状态重置为 Pending，错误文案清空，ID 保留
    pub fn reset_for_retry(&self) -> Self {
        Self {
            status: UploadTaskStatus::Pending,
            ..self.clone()
        }
    }

    /// 错误文案，无错误时为空串
    pub fn error_text(&self) -> &str {
        self.status.error_text().unwrap_or("")
    }
}
