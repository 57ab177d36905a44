// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::uploader::DEFAULT_WORKERS_COUNT;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 图库 API 配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 图库 API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API 基地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 管理接口访问令牌
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 并发 worker 数
    #[serde(default = "default_workers_count")]
    pub workers_count: usize,
    /// 是否启用去重预检查
    #[serde(default)]
    pub avoid_duplication: bool,
    /// 是否把文件名作为备注上传
    #[serde(default)]
    pub filename_as_comment: bool,
    /// 默认分类标签（逗号分隔）
    #[serde(default)]
    pub categories: String,
    /// 是否默认星标
    #[serde(default)]
    pub starred: bool,
    /// 是否跳过 OCR
    #[serde(default)]
    pub skip_ocr: bool,
    /// 扫描目录时是否跳过隐藏文件（以.开头的文件/文件夹）
    #[serde(default = "default_skip_hidden_files")]
    pub skip_hidden_files: bool,
}

fn default_workers_count() -> usize {
    DEFAULT_WORKERS_COUNT
}

fn default_skip_hidden_files() -> bool {
    true
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            workers_count: default_workers_count(),
            avoid_duplication: false,
            filename_as_comment: false,
            categories: String::new(),
            starred: false,
            skip_ocr: false,
            skip_hidden_files: default_skip_hidden_files(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 日志文件保存目录，None 表示仅控制台输出
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            upload: UploadConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        if config.upload.workers_count == 0 {
            anyhow::bail!("配置项 upload.workers_count 必须为正数");
        }

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {}", e);
                let default_config = Self::default();

                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {}", e);
                }

                default_config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000");
        assert_eq!(config.upload.workers_count, 4); // 默认 4 个 worker
        assert!(!config.upload.avoid_duplication);
        assert!(config.upload.skip_hidden_files);
        assert_eq!(config.log.level, "info");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut config = AppConfig::default();
        config.api.access_token = Some("secret".to_string());
        config.upload.workers_count = 8;
        config.save_to_file(path).await.unwrap();

        let loaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(loaded.api.access_token.as_deref(), Some("secret"));
        assert_eq!(loaded.upload.workers_count, 8);
    }

    #[tokio::test]
    async fn test_partial_config_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();
        tokio::fs::write(path, "[api]\nbase_url = \"http://gallery:8000\"\n")
            .await
            .unwrap();

        let loaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(loaded.api.base_url, "http://gallery:8000");
        assert_eq!(loaded.upload.workers_count, 4);
        assert_eq!(loaded.log.level, "info");
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();
        tokio::fs::write(path, "[upload]\nworkers_count = 0\n")
            .await
            .unwrap();

        assert!(AppConfig::load_from_file(path).await.is_err());
    }
}
