// 图库 API 协议类型与错误分类

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// 上传错误分类
///
/// 全部限定在单个任务范围内，不会让整个批次失败。
/// Display 文案即任务的 error_text，与服务端/界面约定保持一致
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// 未收到任何响应（连接失败、超时等）
    #[error("Network error")]
    Network,

    /// 服务端判定内容已存在（HTTP 409）
    #[error("Duplicated")]
    Duplicate,

    /// 服务端判定文件格式不受支持（HTTP 400 / 415）
    #[error("Invalid file")]
    InvalidFile,

    /// 其它非 2xx 响应，携带服务端 detail 字段
    #[error("{}", detail.as_deref().unwrap_or("Unknown error"))]
    Server { detail: Option<String> },

    /// 未识别的内部异常（编程错误、本地 I/O 失败等）
    #[error("Internal error")]
    Internal(String),
}

impl UploadError {
    /// 从 HTTP 状态码和响应 detail 分类
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match status {
            409 => UploadError::Duplicate,
            400 | 415 => UploadError::InvalidFile,
            _ => UploadError::Server { detail },
        }
    }

    /// 是否为重复冲突
    pub fn is_duplicate(&self) -> bool {
        matches!(self, UploadError::Duplicate)
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        // send() 阶段的错误说明没有拿到响应
        match err.status() {
            Some(status) => UploadError::from_status(status.as_u16(), None),
            None => UploadError::Network,
        }
    }
}

/// 上传附带的元数据
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    /// 是否存储在服务端本地
    pub local: bool,
    /// 是否星标
    pub starred: bool,
    /// 是否跳过 OCR
    pub skip_ocr: bool,
    /// 分类标签（逗号分隔）
    pub categories: String,
    /// 可选备注（开启"文件名作为备注"时为任务的 upload_name）
    pub comment: Option<String>,
}

/// 服务端错误响应体
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorProtocol {
    pub detail: Option<String>,
}

/// 去重校验请求体
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateValidationRequest {
    pub hashes: Vec<String>,
}

/// 去重校验响应体
///
/// exists 与请求的 hashes 顺序、长度一一对应
#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateValidationResponse {
    pub exists: Vec<bool>,
}

/// 去重校验接口
///
/// 输入一批内容摘要，返回平行布尔数组，true 表示该内容服务端已存在
#[async_trait]
pub trait DuplicateValidator: Send + Sync {
    async fn validate(&self, hashes: &[String]) -> Result<Vec<bool>, UploadError>;
}

/// 上传传输接口
///
/// 执行单个文件的实际上传，成功返回 ()，失败返回已分类的错误
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(&self, file: &Path, metadata: &UploadMetadata) -> Result<(), UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_text_mapping() {
        assert_eq!(UploadError::Network.to_string(), "Network error");
        assert_eq!(UploadError::Duplicate.to_string(), "Duplicated");
        assert_eq!(UploadError::InvalidFile.to_string(), "Invalid file");
        assert_eq!(
            UploadError::Server {
                detail: Some("Quota exceeded".to_string())
            }
            .to_string(),
            "Quota exceeded"
        );
        assert_eq!(
            UploadError::Server { detail: None }.to_string(),
            "Unknown error"
        );
        assert_eq!(
            UploadError::Internal("lock poisoned".to_string()).to_string(),
            "Internal error"
        );
    }

    #[test]
    fn test_from_status_classification() {
        assert_eq!(UploadError::from_status(409, None), UploadError::Duplicate);
        assert_eq!(
            UploadError::from_status(400, None),
            UploadError::InvalidFile
        );
        assert_eq!(
            UploadError::from_status(415, None),
            UploadError::InvalidFile
        );
        assert_eq!(
            UploadError::from_status(500, Some("boom".to_string())),
            UploadError::Server {
                detail: Some("boom".to_string())
            }
        );
        assert_eq!(
            UploadError::from_status(503, None),
            UploadError::Server { detail: None }
        );
    }
}
