// 图库客户端实现

use crate::gallery::types::{
    DuplicateValidationRequest, DuplicateValidationResponse, DuplicateValidator, ErrorProtocol,
    UploadError, UploadMetadata, UploadTransport,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart;
use reqwest::{Client, Response};
use std::path::Path;
use tracing::{debug, info, warn};

/// 访问令牌请求头
const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";

/// 图库 API 客户端
///
/// 持有带鉴权头的 HTTP 客户端和 API 基地址，
/// 同时实现上传传输与去重校验两个接口
#[derive(Debug, Clone)]
pub struct GalleryClient {
    /// HTTP 客户端
    client: Client,
    /// API 基地址（不带末尾斜杠）
    base_url: String,
}

impl GalleryClient {
    /// 创建新的图库客户端
    ///
    /// # 参数
    /// * `base_url` - API 基地址
    /// * `access_token` - 可选访问令牌，设置后附加到每个请求头
    pub fn new(base_url: &str, access_token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = access_token {
            let value = HeaderValue::from_str(token).context("访问令牌包含非法字符")?;
            headers.insert(ACCESS_TOKEN_HEADER, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "初始化图库客户端成功, base_url={}, token={}",
            base_url,
            if access_token.is_some() {
                "已设置"
            } else {
                "未设置"
            }
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 将非 2xx 响应映射为分类错误
    async fn classify_response(response: Response) -> UploadError {
        let status = response.status().as_u16();
        // 尽量解析服务端的 detail 字段，解析失败时保持 None
        let detail = response
            .json::<ErrorProtocol>()
            .await
            .ok()
            .and_then(|body| body.detail);

        debug!("服务端返回错误: status={}, detail={:?}", status, detail);
        UploadError::from_status(status, detail)
    }
}

#[async_trait]
impl UploadTransport for GalleryClient {
    /// 上传单个文件
    ///
    /// multipart 提交文件内容，元数据走查询参数
    async fn upload(&self, file: &Path, metadata: &UploadMetadata) -> Result<(), UploadError> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| UploadError::Internal(format!("读取文件失败: {:?}: {}", file, e)))?;

        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let part = multipart::Part::bytes(bytes).file_name(file_name);
        let form = multipart::Form::new().part("image_file", part);

        let mut query = vec![
            ("local", metadata.local.to_string()),
            ("star", metadata.starred.to_string()),
            ("skip_ocr", metadata.skip_ocr.to_string()),
            ("categories", metadata.categories.clone()),
        ];
        if let Some(ref comment) = metadata.comment {
            query.push(("comment", comment.clone()));
        }

        let response = self
            .client
            .post(self.endpoint("/admin/upload"))
            .query(&query)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("上传请求未收到响应: {:?}: {}", file, e);
                UploadError::Network
            })?;

        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        debug!("上传成功: {:?}", file);
        Ok(())
    }
}

#[async_trait]
impl DuplicateValidator for GalleryClient {
    /// 校验一批内容摘要是否已存在
    async fn validate(&self, hashes: &[String]) -> Result<Vec<bool>, UploadError> {
        let request = DuplicateValidationRequest {
            hashes: hashes.to_vec(),
        };

        let response = self
            .client
            .post(self.endpoint("/admin/duplication_validate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("去重校验请求未收到响应: {}", e);
                UploadError::Network
            })?;

        if !response.status().is_success() {
            return Err(Self::classify_response(response).await);
        }

        let body: DuplicateValidationResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Internal(format!("去重校验响应解析失败: {}", e)))?;

        // 协议约定平行数组，长度不符说明服务端行为异常
        if body.exists.len() != hashes.len() {
            return Err(UploadError::Internal(format!(
                "去重校验响应长度不符: 期望 {}, 实际 {}",
                hashes.len(),
                body.exists.len()
            )));
        }

        Ok(body.exists)
    }
}
