use anyhow::{Context, Result};
use neko_gallery_rust::config::AppConfig;
use neko_gallery_rust::gallery::GalleryClient;
use neko_gallery_rust::uploader::{
    FolderScanner, ScanOptions, TaskIdGenerator, UploadOptions, UploadService, UploadTask,
};
use neko_gallery_rust::logging;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 命令行参数
#[derive(Debug, Default)]
struct CliArgs {
    /// 配置文件路径
    config_path: Option<String>,
    /// 要上传的文件或目录
    paths: Vec<PathBuf>,
    /// 覆盖配置中的 worker 数
    workers: Option<usize>,
    /// 覆盖配置中的分类标签
    categories: Option<String>,
    /// 星标上传
    starred: bool,
    /// 跳过 OCR
    skip_ocr: bool,
    /// 启用去重预检查
    dedup: bool,
    /// 文件名作为备注
    comment_filename: bool,
}

fn print_usage() {
    eprintln!(
        "用法: neko-gallery-rust [选项] <文件或目录>...\n\
         \n\
         选项:\n\
         \x20 --config <路径>       配置文件路径（默认 config/app.toml）\n\
         \x20 --workers <N>         并发 worker 数\n\
         \x20 --categories <标签>   分类标签（逗号分隔）\n\
         \x20 --starred             星标上传的图片\n\
         \x20 --skip-ocr            跳过服务端 OCR\n\
         \x20 --dedup               上传前按内容摘要去重\n\
         \x20 --comment-filename    将文件名作为备注上传\n\
         \x20 --help                显示本帮助"
    );
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config 缺少参数")?;
                parsed.config_path = Some(value.clone());
            }
            "--workers" => {
                let value = iter.next().context("--workers 缺少参数")?;
                let workers: usize = value.parse().context("--workers 必须是正整数")?;
                if workers == 0 {
                    anyhow::bail!("--workers 必须是正整数");
                }
                parsed.workers = Some(workers);
            }
            "--categories" => {
                let value = iter.next().context("--categories 缺少参数")?;
                parsed.categories = Some(value.clone());
            }
            "--starred" => parsed.starred = true,
            "--skip-ocr" => parsed.skip_ocr = true,
            "--dedup" => parsed.dedup = true,
            "--comment-filename" => parsed.comment_filename = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                anyhow::bail!("未知选项: {}", other);
            }
            path => parsed.paths.push(PathBuf::from(path)),
        }
    }

    Ok(parsed)
}

/// 把命令行给出的文件和目录展开成上传任务队列
///
/// 目录内的文件以相对路径作为 upload_name，保留层级信息；
/// 显式指定的单个文件不做扩展名过滤，用户说了算
fn build_queue(args: &CliArgs, config: &AppConfig, ids: &TaskIdGenerator) -> Result<Vec<UploadTask>> {
    let scan_options = ScanOptions {
        skip_hidden: config.upload.skip_hidden_files,
        ..ScanOptions::default()
    };

    let categories = args
        .categories
        .clone()
        .unwrap_or_else(|| config.upload.categories.clone());
    let starred = args.starred || config.upload.starred;
    let skip_ocr = args.skip_ocr || config.upload.skip_ocr;

    let mut queue = Vec::new();
    for path in &args.paths {
        if path.is_dir() {
            let files = FolderScanner::scan(path, &scan_options)?;
            if files.is_empty() {
                warn!("目录中没有可上传的图片: {:?}", path);
            }
            for file in files {
                let mut task = UploadTask::with_name(ids, file.local_path, file.relative_path);
                task.categories = categories.clone();
                task.starred = starred;
                task.skip_ocr = skip_ocr;
                queue.push(task);
            }
        } else if path.is_file() {
            let mut task = UploadTask::new(ids, path.clone());
            task.categories = categories.clone();
            task.starred = starred;
            task.skip_ocr = skip_ocr;
            queue.push(task);
        } else {
            anyhow::bail!("路径不存在: {:?}", path);
        }
    }

    Ok(queue)
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw_args)?;

    if args.paths.is_empty() {
        print_usage();
        anyhow::bail!("至少指定一个要上传的文件或目录");
    }

    let config_path = args.config_path.as_deref().unwrap_or("config/app.toml");
    let config = AppConfig::load_or_default(config_path).await;

    // 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&config.log);

    info!("Neko Gallery Rust v0.4.1 启动");

    let ids = TaskIdGenerator::new();
    let queue = build_queue(&args, &config, &ids)?;
    let total = queue.len();
    if total == 0 {
        info!("没有需要上传的文件");
        return Ok(());
    }
    info!("共 {} 个文件待上传", total);

    let client = Arc::new(GalleryClient::new(
        &config.api.base_url,
        config.api.access_token.as_deref(),
    )?);

    let options = UploadOptions {
        workers_count: args.workers.unwrap_or(config.upload.workers_count),
        avoid_duplication: args.dedup || config.upload.avoid_duplication,
        filename_as_comment: args.comment_filename || config.upload.filename_as_comment,
    };

    let service = Arc::new(UploadService::new(
        queue,
        client.clone(),
        client,
        options,
    ));

    // 进度上报任务，每 2 秒打印一次聚合计数
    let progress_service = service.clone();
    let progress = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let counts = progress_service.counts().await;
            info!(
                "进度: {}/{} (完成 {}, 失败 {}, 重复 {})",
                counts.finished(),
                total,
                counts.completed,
                counts.error,
                counts.duplicate
            );
        }
    });

    let result = service.upload().await;
    progress.abort();
    result?;

    let counts = service.counts().await;
    info!(
        "全部结束: 完成 {}, 失败 {}, 重复 {}",
        counts.completed, counts.error, counts.duplicate
    );

    // 逐个列出失败任务，方便用户重试
    if counts.error > 0 {
        for task in service.snapshot().await {
            if let neko_gallery_rust::uploader::UploadTaskStatus::Error(message) = &task.status {
                warn!("失败: {} -> {}", task.upload_name, message);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_paths_and_flags() {
        let parsed = parse_args(&args(&[
            "--workers",
            "8",
            "--dedup",
            "--categories",
            "cats,memes",
            "photos/",
            "single.png",
        ]))
        .unwrap();

        assert_eq!(parsed.workers, Some(8));
        assert!(parsed.dedup);
        assert_eq!(parsed.categories.as_deref(), Some("cats,memes"));
        assert_eq!(
            parsed.paths,
            vec![PathBuf::from("photos/"), PathBuf::from("single.png")]
        );
    }

    #[test]
    fn test_parse_args_rejects_zero_workers() {
        assert!(parse_args(&args(&["--workers", "0", "photos/"])).is_err());
    }

    #[test]
    fn test_parse_args_rejects_unknown_option() {
        assert!(parse_args(&args(&["--frobnicate", "photos/"])).is_err());
    }
}
