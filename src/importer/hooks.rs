// ==========================================
// 分类信息导入系统 - 导入回调
// ==========================================
// 职责: 前置/后置回调 Trait + 命名注册表
// 规则:
// - 回调按名称在进程内注册表中解析, 不做运行时代码加载
// - "路径,标识符" 形式仅使用标识符, 路径被忽略
// - 回调返回错误时中止整个导入运行
// ==========================================

use crate::domain::listing::Listing;
use crate::domain::row::RawRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_mode::ImporterMode;
use std::collections::BTreeMap;
use tracing::{debug, info};

// ==========================================
// Hook Traits
// ==========================================

/// 前置回调: 在类型解析前原地修改原始行
pub trait PreCreateHook: Send {
    fn before_create(&mut self, row: &mut RawRow, mode: ImporterMode) -> anyhow::Result<()>;
}

/// 后置回调: 接收本行结果条目、模式与原始行
///
/// dry-run / skip 下条目可能未持久化（id 为 None）
pub trait PostCreateHook: Send {
    fn after_create(
        &mut self,
        listing: &Listing,
        mode: ImporterMode,
        row: &RawRow,
    ) -> anyhow::Result<()>;
}

impl<F> PreCreateHook for F
where
    F: FnMut(&mut RawRow, ImporterMode) -> anyhow::Result<()> + Send,
{
    fn before_create(&mut self, row: &mut RawRow, mode: ImporterMode) -> anyhow::Result<()> {
        self(row, mode)
    }
}

impl<F> PostCreateHook for F
where
    F: FnMut(&Listing, ImporterMode, &RawRow) -> anyhow::Result<()> + Send,
{
    fn after_create(
        &mut self,
        listing: &Listing,
        mode: ImporterMode,
        row: &RawRow,
    ) -> anyhow::Result<()> {
        self(listing, mode, row)
    }
}

// ==========================================
// 内置回调
// ==========================================

/// 去除所有列值两端空白
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimValues;

impl PreCreateHook for TrimValues {
    fn before_create(&mut self, row: &mut RawRow, _mode: ImporterMode) -> anyhow::Result<()> {
        for value in row.values_mut() {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
        }
        Ok(())
    }
}

/// 标题缺失时报错（中止运行）
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireTitle;

impl PreCreateHook for RequireTitle {
    fn before_create(&mut self, row: &mut RawRow, _mode: ImporterMode) -> anyhow::Result<()> {
        if row.title().is_none() {
            anyhow::bail!("第 {} 行缺少 wp_post.post_title", row.row_number());
        }
        Ok(())
    }
}

/// 记录结果条目
#[derive(Debug, Clone, Copy, Default)]
pub struct LogListing;

impl PostCreateHook for LogListing {
    fn after_create(
        &mut self,
        listing: &Listing,
        mode: ImporterMode,
        row: &RawRow,
    ) -> anyhow::Result<()> {
        info!(
            row_number = row.row_number(),
            listing_id = ?listing.id,
            title = %listing.title,
            listing_type = %listing.listing_type,
            mode = %mode.mode(),
            "条目处理完成"
        );
        Ok(())
    }
}

// ==========================================
// HookRegistry - 命名回调注册表
// ==========================================
pub const TRIM_VALUES: &str = "trim-values";
pub const REQUIRE_TITLE: &str = "require-title";
pub const LOG_LISTING: &str = "log-listing";

#[derive(Default)]
pub struct HookRegistry {
    pre: BTreeMap<String, Box<dyn PreCreateHook>>,
    post: BTreeMap<String, Box<dyn PostCreateHook>>,
}

impl HookRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置内置回调的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_pre(TRIM_VALUES, TrimValues);
        registry.register_pre(REQUIRE_TITLE, RequireTitle);
        registry.register_post(LOG_LISTING, LogListing);
        registry
    }

    /// 注册前置回调（同名覆盖）
    pub fn register_pre<H>(&mut self, name: impl Into<String>, hook: H)
    where
        H: PreCreateHook + 'static,
    {
        self.pre.insert(name.into(), Box::new(hook));
    }

    /// 注册后置回调（同名覆盖）
    pub fn register_post<H>(&mut self, name: impl Into<String>, hook: H)
    where
        H: PostCreateHook + 'static,
    {
        self.post.insert(name.into(), Box::new(hook));
    }

    pub fn pre_names(&self) -> impl Iterator<Item = &str> {
        self.pre.keys().map(String::as_str)
    }

    pub fn post_names(&self) -> impl Iterator<Item = &str> {
        self.post.keys().map(String::as_str)
    }

    /// 取出前置回调（单次运行, 取出后从注册表移除）
    ///
    /// # 参数
    /// - callback: "identifier" 或 "path,identifier"
    pub fn take_pre(&mut self, callback: &str) -> ImportResult<Box<dyn PreCreateHook>> {
        let name = parse_callback(callback)?;
        self.pre.remove(name).ok_or_else(|| {
            ImportError::CallableResolutionError(format!("未注册的前置回调: {}", name))
        })
    }

    /// 取出后置回调
    pub fn take_post(&mut self, callback: &str) -> ImportResult<Box<dyn PostCreateHook>> {
        let name = parse_callback(callback)?;
        self.post.remove(name).ok_or_else(|| {
            ImportError::CallableResolutionError(format!("未注册的后置回调: {}", name))
        })
    }
}

/// 解析回调描述, 返回标识符
fn parse_callback(callback: &str) -> ImportResult<&str> {
    let (path, name) = match callback.split_once(',') {
        Some((path, name)) => (Some(path.trim()), name.trim()),
        None => (None, callback.trim()),
    };

    if let Some(path) = path.filter(|p| !p.is_empty()) {
        debug!(path = %path, identifier = %name, "回调路径被忽略, 仅按标识符解析");
    }

    if name.is_empty() || name.contains(',') {
        return Err(ImportError::CallableResolutionError(format!(
            "回调描述非法: {:?}",
            callback
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Mode;

    #[test]
    fn test_parse_callback_forms() {
        assert_eq!(parse_callback("trim-values").unwrap(), "trim-values");
        assert_eq!(
            parse_callback("/opt/hooks.php, trim-values").unwrap(),
            "trim-values"
        );
        assert!(parse_callback("").is_err());
        assert!(parse_callback("path,").is_err());
        assert!(parse_callback("a,b,c").is_err());
    }

    #[test]
    fn test_builtin_trim_values() {
        let mut registry = HookRegistry::with_builtins();
        let mut hook = registry.take_pre(TRIM_VALUES).unwrap();

        let mut row = RawRow::from_pairs(1, [("wp_post.post_title", "  Loft "), ("price", "10")]);
        hook.before_create(&mut row, ImporterMode::default()).unwrap();
        assert_eq!(row.get("wp_post.post_title"), Some("Loft"));

        // 已取出
        assert!(registry.take_pre(TRIM_VALUES).is_err());
    }

    #[test]
    fn test_require_title_fails_on_missing_title() {
        let mut hook = RequireTitle;
        let mut row = RawRow::from_pairs(4, [("price", "10")]);
        let err = hook
            .before_create(&mut row, ImporterMode::default())
            .unwrap_err();
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_closure_hooks_and_unknown_names() {
        let mut registry = HookRegistry::new();
        registry.register_pre("upper", |row: &mut RawRow, mode: ImporterMode| -> anyhow::Result<()> {
            if !mode.is_dry_run() {
                if let Some(v) = row.get_mut("city") {
                    *v = v.to_uppercase();
                }
            }
            Ok(())
        });

        let mut hook = registry.take_pre("hooks.rs,upper").unwrap();
        let mut row = RawRow::from_pairs(1, [("city", "paris")]);
        hook.before_create(&mut row, ImporterMode::new(Mode::Update))
            .unwrap();
        assert_eq!(row.get("city"), Some("PARIS"));

        assert!(matches!(
            registry.take_post("nope"),
            Err(ImportError::CallableResolutionError(_))
        ));
    }
}
