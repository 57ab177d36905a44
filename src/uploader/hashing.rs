// 内容哈希计算
//
// 去重预检查原理：
// 1. 计算文件内容的 SHA-1 摘要
// 2. 将摘要发送给服务器做存在性校验
// 3. 如果服务器已有相同内容，则跳过上传（标记为重复）

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// 内容哈希计算器
pub struct ContentHasher;

impl ContentHasher {
    /// 计算文件内容的 SHA-1 摘要（小写十六进制）
    ///
    /// 摘要是确定性的：内容相同的文件得到相同摘要
    ///
    /// # 参数
    /// * `path` - 本地文件路径
    pub async fn compute_digest(path: &Path) -> Result<String> {
        let path = path.to_path_buf();

        // 在阻塞线程池中执行文件 I/O
        tokio::task::spawn_blocking(move || Self::compute_digest_sync(&path))
            .await
            .context("计算摘要任务执行失败")?
    }

    /// 同步计算摘要（内部方法）
    fn compute_digest_sync(path: &Path) -> Result<String> {
        use std::fs::File;

        let file = File::open(path).context(format!("无法打开文件: {:?}", path))?;
        let file_size = file.metadata().context("无法获取文件元数据")?.len();

        // 使用 BufReader 提高读取效率
        let mut reader = std::io::BufReader::with_capacity(1024 * 1024, file);
        let mut hasher = Sha1::new();
        let mut buffer = [0u8; 65536]; // 64KB 缓冲区

        loop {
            let bytes_read = reader.read(&mut buffer).context("读取文件失败")?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        let digest = hex::encode(hasher.finalize());

        debug!(
            "文件摘要计算完成: path={:?}, size={}, sha1={}",
            path, file_size, digest
        );

        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_compute_digest_known_value() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"hello world").unwrap();
        temp_file.flush().unwrap();

        let digest = ContentHasher::compute_digest(temp_file.path()).await.unwrap();
        // echo -n "hello world" | sha1sum
        assert_eq!(digest, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[tokio::test]
    async fn test_compute_digest_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();

        let digest = ContentHasher::compute_digest(temp_file.path()).await.unwrap();
        assert_eq!(digest, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[tokio::test]
    async fn test_digest_deterministic() {
        let content = vec![0xabu8; 512 * 1024]; // 大于单次读取缓冲区

        let mut first = NamedTempFile::new().unwrap();
        first.write_all(&content).unwrap();
        first.flush().unwrap();

        let mut second = NamedTempFile::new().unwrap();
        second.write_all(&content).unwrap();
        second.flush().unwrap();

        let a = ContentHasher::compute_digest(first.path()).await.unwrap();
        let b = ContentHasher::compute_digest(second.path()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_compute_digest_nonexistent_file() {
        let result = ContentHasher::compute_digest(Path::new("/nonexistent/file.png")).await;
        assert!(result.is_err());
    }
}
