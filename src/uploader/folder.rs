// 目录扫描
//
// 递归收集目录下的图片文件，生成上传队列的原料。
// relative_path 用作任务的 upload_name，保留目录层级信息

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 支持上传的图片扩展名（小写比较）
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// 扫描选项
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 跳过隐藏文件和隐藏目录（以 . 开头）
    pub skip_hidden: bool,
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
    /// 最大收集文件数，None 表示不限
    pub max_files: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            follow_symlinks: false,
            max_files: None,
        }
    }
}

/// 扫描结果中的单个文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// 本地绝对/原始路径
    pub local_path: PathBuf,
    /// 相对扫描根目录的路径（正斜杠分隔）
    pub relative_path: String,
    /// 文件大小（字节）
    pub size: u64,
}

/// 目录扫描器
pub struct FolderScanner;

impl FolderScanner {
    /// 递归扫描目录，返回按相对路径排序的图片文件列表
    ///
    /// 非图片扩展名的文件直接跳过；单个文件读取元数据失败只告警不中断
    pub fn scan(root: &Path, options: &ScanOptions) -> Result<Vec<ScannedFile>> {
        if !root.is_dir() {
            anyhow::bail!("扫描目标不是目录: {:?}", root);
        }

        info!("开始扫描目录: {:?}", root);

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(options.follow_symlinks)
            .into_iter()
            .filter_entry(|entry| {
                if !options.skip_hidden {
                    return true;
                }
                // 根目录本身不参与隐藏判断
                entry.depth() == 0 || !Self::is_hidden(entry.file_name())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("扫描条目失败: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if !Self::is_image(entry.path()) {
                debug!("跳过非图片文件: {:?}", entry.path());
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("读取文件元数据失败: {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            let relative = entry
                .path()
                .strip_prefix(root)
                .context("计算相对路径失败")?;
            let relative_path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            files.push(ScannedFile {
                local_path: entry.path().to_path_buf(),
                relative_path,
                size: metadata.len(),
            });
        }

        // 排序保证队列顺序稳定，与遍历顺序无关
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        if let Some(max) = options.max_files {
            files.truncate(max);
        }

        info!("目录扫描完成: {:?}, 共 {} 个图片文件", root, files.len());
        Ok(files)
    }

    /// 按扩展名判断是否为支持的图片
    pub fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let lower = ext.to_ascii_lowercase();
                IMAGE_EXTENSIONS.contains(&lower.as_str())
            })
            .unwrap_or(false)
    }

    fn is_hidden(name: &std::ffi::OsStr) -> bool {
        name.to_string_lossy().starts_with('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, relative: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"fake image bytes").unwrap();
        path
    }

    #[test]
    fn test_scan_collects_only_images_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "sub/c.webp");

        let files = FolderScanner::scan(dir.path(), &ScanOptions::default()).unwrap();
        let relatives: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(relatives, vec!["a.jpg", "b.png", "sub/c.webp"]);
        assert!(files.iter().all(|f| f.size > 0));
    }

    #[test]
    fn test_scan_skips_hidden() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "visible.png");
        touch(dir.path(), ".hidden.png");
        touch(dir.path(), ".cache/thumb.jpg");

        let files = FolderScanner::scan(dir.path(), &ScanOptions::default()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "visible.png");

        let all = FolderScanner::scan(
            dir.path(),
            &ScanOptions {
                skip_hidden: false,
                ..ScanOptions::default()
            },
        )
        .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_scan_max_files() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("img{}.png", i));
        }

        let files = FolderScanner::scan(
            dir.path(),
            &ScanOptions {
                max_files: Some(2),
                ..ScanOptions::default()
            },
        )
        .unwrap();
        assert_eq!(files.len(), 2);
        // 截断发生在排序之后
        assert_eq!(files[0].relative_path, "img0.png");
        assert_eq!(files[1].relative_path, "img1.png");
    }

    #[test]
    fn test_scan_rejects_non_directory() {
        let dir = TempDir::new().unwrap();
        let file = touch(dir.path(), "single.png");
        assert!(FolderScanner::scan(&file, &ScanOptions::default()).is_err());
    }

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(FolderScanner::is_image(Path::new("photo.JPG")));
        assert!(FolderScanner::is_image(Path::new("photo.jpeg")));
        assert!(FolderScanner::is_image(Path::new("anim.GIF")));
        assert!(!FolderScanner::is_image(Path::new("doc.pdf")));
        assert!(!FolderScanner::is_image(Path::new("no_extension")));
    }
}
