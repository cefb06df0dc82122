// ==========================================
// 分类信息导入系统 - 命令行主入口
// ==========================================
// 流程: 解析参数 → 日志 → 配置 → 打开内容库 → 导入 → 输出报告(JSON)
// ==========================================

use anyhow::{Context, Result};
use clap::Parser;
use listing_importer::cli::CliArgs;
use listing_importer::{logging, HookRegistry, ListingImporter, SqliteContentStore};
use std::fs;
use tracing::info;

fn main() -> Result<()> {
    let args = CliArgs::parse();

    // 初始化日志系统
    if args.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    info!("==================================================");
    info!("分类信息导入工具 v{}", listing_importer::VERSION);
    info!("==================================================");

    let config = args
        .to_builder()
        .context("配置加载失败")?
        .build()
        .context("配置校验失败")?;

    // 内容库
    let db_path = config.db_path().to_path_buf();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("无法创建数据目录: {}", parent.display()))?;
    }
    let db_path_str = db_path.to_string_lossy();
    info!("使用内容库: {}", db_path_str);
    let store = SqliteContentStore::new(&db_path_str).context("内容库初始化失败")?;

    // 导入
    let mut hooks = HookRegistry::with_builtins();
    let mut importer = ListingImporter::new(store);
    importer
        .configure(config, &mut hooks)
        .context("导入器配置失败")?;

    let report = importer
        .run(&args.file)
        .with_context(|| format!("导入失败: {}", args.file.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
