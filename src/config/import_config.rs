// ==========================================
// 分类信息导入系统 - 导入配置
// ==========================================
// 职责: 一次导入运行的不可变配置 + 构建器
// 规则:
// - 构建器阶段可写（配置文件 → 命令行逐层覆盖）
// - build() 之后只读, 运行中不可再改
// ==========================================

use crate::domain::types::{ListingType, Mode};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_mode::ImporterMode;
use crate::importer::type_mapper::ListingTypeMapper;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 数据目录环境变量（测试/CI 使用）
pub const DATA_DIR_ENV: &str = "LISTING_IMPORTER_HOME";

/// 默认上传公开路径
pub const DEFAULT_UPLOAD_BASE_URL: &str = "/uploads";

/// 获取默认数据目录
///
/// # 返回
/// - 环境变量 LISTING_IMPORTER_HOME（非空时）
/// - 用户数据目录/listing-importer
/// - 兜底: ./listing-importer
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::data_dir()
        .map(|d| d.join("listing-importer"))
        .unwrap_or_else(|| PathBuf::from("./listing-importer"))
}

/// 默认内容库路径
pub fn default_db_path() -> PathBuf {
    default_data_dir().join("listing_importer.db")
}

/// 默认上传目录
pub fn default_upload_dir() -> PathBuf {
    default_data_dir().join("uploads")
}

// ==========================================
// ImportConfig - 不可变配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    mode: ImporterMode,
    default_listing_type: ListingType,
    type_mapper: ListingTypeMapper,
    template_overrides: BTreeMap<ListingType, PathBuf>,
    db_path: PathBuf,
    upload_dir: PathBuf,
    upload_base_url: String,
    abort_on_persistence_error: bool,
    start: usize,
    end: Option<usize>,
    pre_create_callback: Option<String>,
    post_create_callback: Option<String>,
}

impl ImportConfig {
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder::new()
    }

    pub fn mode(&self) -> ImporterMode {
        self.mode
    }

    pub fn default_listing_type(&self) -> ListingType {
        self.default_listing_type
    }

    pub fn type_mapper(&self) -> &ListingTypeMapper {
        &self.type_mapper
    }

    pub fn template_overrides(&self) -> &BTreeMap<ListingType, PathBuf> {
        &self.template_overrides
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn upload_base_url(&self) -> &str {
        &self.upload_base_url
    }

    pub fn abort_on_persistence_error(&self) -> bool {
        self.abort_on_persistence_error
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> Option<usize> {
        self.end
    }

    pub fn pre_create_callback(&self) -> Option<&str> {
        self.pre_create_callback.as_deref()
    }

    pub fn post_create_callback(&self) -> Option<&str> {
        self.post_create_callback.as_deref()
    }
}

// ==========================================
// ConfigFile - JSON 配置文件（全部可选）
// ==========================================
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    mode: Option<String>,
    default_listing_type: Option<ListingType>,
    #[serde(default)]
    listing_types: BTreeMap<ListingType, Vec<String>>,
    #[serde(default)]
    templates: BTreeMap<ListingType, PathBuf>,
    db_path: Option<PathBuf>,
    upload_dir: Option<PathBuf>,
    upload_base_url: Option<String>,
    abort_on_persistence_error: Option<bool>,
    start: Option<usize>,
    end: Option<usize>,
    pre_create_callback: Option<String>,
    post_create_callback: Option<String>,
}

// ==========================================
// ImportConfigBuilder - 配置构建器
// ==========================================
#[derive(Debug, Clone)]
pub struct ImportConfigBuilder {
    config: ImportConfig,
}

impl Default for ImportConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportConfigBuilder {
    /// 默认配置: update 模式 / generic 默认类型 / 预置内部标签
    pub fn new() -> Self {
        Self {
            config: ImportConfig {
                mode: ImporterMode::default(),
                default_listing_type: ListingType::Generic,
                type_mapper: ListingTypeMapper::with_builtin_labels(),
                template_overrides: BTreeMap::new(),
                db_path: default_db_path(),
                upload_dir: default_upload_dir(),
                upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
                abort_on_persistence_error: false,
                start: 0,
                end: None,
                pre_create_callback: None,
                post_create_callback: None,
            },
        }
    }

    /// 从 JSON 配置文件构建（文件中未出现的项保持默认）
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ImportError::InvalidConfig {
            key: path.display().to_string(),
            message: e.to_string(),
        })?;
        let file: ConfigFile =
            serde_json::from_str(&raw).map_err(|e| ImportError::InvalidConfig {
                key: path.display().to_string(),
                message: e.to_string(),
            })?;

        debug!(path = %path.display(), "已读取配置文件");

        let mut builder = Self::new();
        builder.apply_file(file)?;
        Ok(builder)
    }

    fn apply_file(&mut self, file: ConfigFile) -> ImportResult<()> {
        if let Some(mode) = file.mode {
            self.mode(&mode)?;
        }
        if let Some(t) = file.default_listing_type {
            self.default_listing_type(t);
        }
        for (t, labels) in file.listing_types {
            self.set_types(t, labels);
        }
        for (t, path) in file.templates {
            self.template_override(t, path);
        }
        if let Some(p) = file.db_path {
            self.db_path(p);
        }
        if let Some(p) = file.upload_dir {
            self.upload_dir(p);
        }
        if let Some(url) = file.upload_base_url {
            self.upload_base_url(url);
        }
        if let Some(flag) = file.abort_on_persistence_error {
            self.abort_on_persistence_error(flag);
        }
        if let Some(start) = file.start {
            self.start(start);
        }
        if file.end.is_some() {
            self.end(file.end);
        }
        if let Some(cb) = file.pre_create_callback {
            self.pre_create_callback(cb);
        }
        if let Some(cb) = file.post_create_callback {
            self.post_create_callback(cb);
        }
        Ok(())
    }

    /// 设置模式（非法值立即失败, 原值不变）
    pub fn mode(&mut self, value: &str) -> ImportResult<&mut Self> {
        self.config.mode.set_mode(value)?;
        Ok(self)
    }

    pub fn with_mode(&mut self, mode: Mode) -> &mut Self {
        self.config.mode = ImporterMode::new(mode);
        self
    }

    pub fn default_listing_type(&mut self, listing_type: ListingType) -> &mut Self {
        self.config.default_listing_type = listing_type;
        self
    }

    /// 登记外部标签（后写覆盖）
    pub fn set_types<I, S>(&mut self, listing_type: ListingType, labels: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.type_mapper.set_types(listing_type, labels);
        self
    }

    pub fn template_override(&mut self, listing_type: ListingType, path: impl Into<PathBuf>) -> &mut Self {
        self.config
            .template_overrides
            .insert(listing_type, path.into());
        self
    }

    pub fn db_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.config.db_path = path.into();
        self
    }

    pub fn upload_dir(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.config.upload_dir = path.into();
        self
    }

    pub fn upload_base_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.config.upload_base_url = url.into();
        self
    }

    pub fn abort_on_persistence_error(&mut self, flag: bool) -> &mut Self {
        self.config.abort_on_persistence_error = flag;
        self
    }

    /// 起始行（1 起, 0 为从头）
    pub fn start(&mut self, start: usize) -> &mut Self {
        self.config.start = start;
        self
    }

    /// 结束行（闭区间, None 为不限）
    pub fn end(&mut self, end: Option<usize>) -> &mut Self {
        self.config.end = end;
        self
    }

    pub fn pre_create_callback(&mut self, callback: impl Into<String>) -> &mut Self {
        self.config.pre_create_callback = Some(callback.into());
        self
    }

    pub fn post_create_callback(&mut self, callback: impl Into<String>) -> &mut Self {
        self.config.post_create_callback = Some(callback.into());
        self
    }

    /// 校验并冻结配置
    pub fn build(&self) -> ImportResult<ImportConfig> {
        let config = &self.config;

        if let Some(end) = config.end {
            if end == 0 || end < config.start {
                return Err(ImportError::InvalidConfig {
                    key: "end".to_string(),
                    message: format!("结束行 {} 小于起始行 {}", end, config.start.max(1)),
                });
            }
        }

        if config.upload_base_url.trim().is_empty() {
            return Err(ImportError::InvalidConfig {
                key: "upload_base_url".to_string(),
                message: "上传公开路径不能为空".to_string(),
            });
        }

        Ok(config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_defaults() {
        let config = ImportConfigBuilder::new().build().unwrap();
        assert!(config.mode().is_update());
        assert_eq!(config.default_listing_type(), ListingType::Generic);
        assert_eq!(config.start(), 0);
        assert_eq!(config.end(), None);
        assert!(!config.abort_on_persistence_error());
        assert_eq!(
            config.type_mapper().get_listing_type("newspack_lst_place"),
            Ok(ListingType::Place)
        );
    }

    #[test]
    fn test_invalid_mode_fails_and_keeps_previous() {
        let mut builder = ImportConfigBuilder::new();
        builder.mode("skip").unwrap();
        assert!(matches!(
            builder.mode("Update"),
            Err(ImportError::InvalidMode(_))
        ));
        assert!(builder.build().unwrap().mode().is_skip());
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut builder = ImportConfigBuilder::new();
        builder.start(5).end(Some(3));
        assert!(matches!(
            builder.build(),
            Err(ImportError::InvalidConfig { ref key, .. }) if key == "end"
        ));
    }

    #[test]
    fn test_json_file_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "mode": "dry-run",
                "default_listing_type": "place",
                "listing_types": {{ "marketplace": ["market_raw"] }},
                "upload_base_url": "https://cdn.example.com/media",
                "end": 10
            }}"#
        )
        .unwrap();

        let mut builder = ImportConfigBuilder::from_json_file(file.path()).unwrap();
        builder.end(Some(3));
        let config = builder.build().unwrap();

        assert!(config.mode().is_dry_run());
        assert_eq!(config.default_listing_type(), ListingType::Place);
        assert_eq!(
            config.type_mapper().get_listing_type("market_raw"),
            Ok(ListingType::Marketplace)
        );
        assert_eq!(config.upload_base_url(), "https://cdn.example.com/media");
        assert_eq!(config.end(), Some(3));
    }

    #[test]
    fn test_json_file_rejects_unknown_keys_and_bad_mode() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "colour": "blue" }}"#).unwrap();
        assert!(matches!(
            ImportConfigBuilder::from_json_file(file.path()),
            Err(ImportError::InvalidConfig { .. })
        ));

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "mode": "delete" }}"#).unwrap();
        assert!(matches!(
            ImportConfigBuilder::from_json_file(file.path()),
            Err(ImportError::InvalidMode(_))
        ));
    }
}
