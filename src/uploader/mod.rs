// 上传模块
//
// 子模块划分：
// - task: 上传任务实体与状态机
// - hashing: 内容摘要计算（去重预检查用）
// - folder: 目录扫描
// - service: 并发上传调度

pub mod folder;
pub mod hashing;
pub mod service;
pub mod task;

pub use folder::{FolderScanner, ScanOptions, ScannedFile, IMAGE_EXTENSIONS};
pub use hashing::ContentHasher;
pub use service::{
    StatusUpdateCallback, UploadCounts, UploadOptions, UploadService, DEFAULT_WORKERS_COUNT,
};
pub use task::{TaskId, TaskIdGenerator, UploadTask, UploadTaskStatus, DUPLICATED_TEXT};
