// Neko Gallery Rust Library
// 图库批量上传客户端核心库

// 配置管理模块
pub mod config;

// 图库API模块
pub mod gallery;

// 日志模块
pub mod logging;

// 上传引擎模块
pub mod uploader;

// 导出常用类型
pub use config::AppConfig;
pub use gallery::{DuplicateValidator, GalleryClient, UploadError, UploadMetadata, UploadTransport};
pub use uploader::{
    ContentHasher, FolderScanner, ScanOptions, TaskIdGenerator, UploadCounts, UploadOptions,
    UploadService, UploadTask, UploadTaskStatus,
};
