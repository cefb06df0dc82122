// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时内容库 / 临时上传目录 / 导入器构建 / 测试文件生成
// ==========================================

#![allow(dead_code)]

use listing_importer::config::ImportConfigBuilder;
use listing_importer::domain::types::{ListingType, Mode};
use listing_importer::importer::{HookRegistry, ListingImporter};
use listing_importer::repository::SqliteContentStore;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// 夹具目录
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// 测试环境: 临时内容库 + 临时上传目录（需保持存活）
pub struct TestEnv {
    pub db_file: NamedTempFile,
    pub upload_dir: TempDir,
    pub work_dir: TempDir,
    pub store: SqliteContentStore,
}

impl TestEnv {
    pub fn new() -> Self {
        let db_file = NamedTempFile::new().unwrap();
        let store = SqliteContentStore::new(db_file.path().to_str().unwrap()).unwrap();
        Self {
            db_file,
            upload_dir: TempDir::new().unwrap(),
            work_dir: TempDir::new().unwrap(),
            store,
        }
    }

    /// 基础配置: 上传目录 + 常用标签映射
    pub fn builder(&self, mode: Mode) -> ImportConfigBuilder {
        let mut builder = ImportConfigBuilder::new();
        builder
            .with_mode(mode)
            .db_path(self.db_file.path())
            .upload_dir(self.upload_dir.path())
            .upload_base_url("/uploads")
            .set_types(ListingType::Marketplace, ["market_raw"])
            .set_types(ListingType::Place, ["venue"])
            .set_types(ListingType::Event, ["tribe_events"]);
        builder
    }

    /// 按配置构建导入器（共享同一内容库）
    pub fn importer(&self, builder: &ImportConfigBuilder) -> ListingImporter<SqliteContentStore> {
        let mut importer = ListingImporter::new(self.store.clone());
        importer
            .configure(builder.build().unwrap(), &mut HookRegistry::with_builtins())
            .unwrap();
        importer
    }

    /// 在工作目录写入文件
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.work_dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// 在工作目录生成 PNG 图片
    pub fn write_png(&self, name: &str) -> PathBuf {
        let path = self.work_dir.path().join(name);
        image::RgbImage::from_pixel(64, 48, image::Rgb([10, 120, 200]))
            .save(&path)
            .unwrap();
        path
    }

    /// 上传目录内的文件数（递归）
    pub fn uploaded_file_count(&self) -> usize {
        count_files(self.upload_dir.path())
    }
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() {
                        count_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}
