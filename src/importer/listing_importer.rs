// ==========================================
// 分类信息导入系统 - 列表导入器（编排）
// ==========================================
// 状态: Idle → Configuring → Running → Done（单次运行）
// 每行流程:
// 1. 前置回调（可修改原始行）
// 2. 行映射（wp_post.* / other_data / images 一次性校验）
// 3. 解析列表类型（未映射回退默认类型）
// 4. 解析图片
// 5. 渲染正文
// 6. 组装字段（作者/日期/默认值/固定元数据）
// 7. 按 标题 + 类型 查找已有条目
// 8. 按模式分支: dry-run 预览 / skip 报告存在性 / update 合并或新建
// 9. 后置回调
// ==========================================

use crate::config::ImportConfig;
use crate::domain::listing::{
    FieldChange, Listing, META_FEATURED_IMAGE_POSITION, META_PAGE_TEMPLATE,
};
use crate::domain::media::ResolvedImages;
use crate::domain::report::{ImportReport, ImportSummary, RowAction, RowFailure, RowOutcome};
use crate::domain::row::{AuthorRef, ImportRow, RawRow};
use crate::domain::types::ListingType;
use crate::importer::cancellation::CancellationToken;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::hooks::{HookRegistry, PostCreateHook, PreCreateHook};
use crate::importer::image_resolver::ImageResolver;
use crate::importer::importer_mode::ImporterMode;
use crate::importer::renderer::ContentRenderer;
use crate::importer::row_mapper::RowMapper;
use crate::importer::row_source::RowSource;
use crate::repository::ContentStore;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 缺省作者 ID（行未提供作者时）
pub const DEFAULT_AUTHOR_ID: i64 = 1;
/// 缺省标题
pub const DEFAULT_TITLE: &str = "(no title)";
/// 缺省状态
pub const DEFAULT_STATUS: &str = "publish";
/// 页面模板固定值
pub const PAGE_TEMPLATE: &str = "single-wide.php";
/// 特色图片位置固定值（正文中已渲染特色图片）
pub const FEATURED_IMAGE_POSITION: &str = "hidden";
/// 特色图片资产 ID 元数据键
pub const META_THUMBNAIL_ID: &str = "_thumbnail_id";

// ==========================================
// RunState - 导入器状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Configuring,
    Running,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Configuring => "configuring",
            RunState::Running => "running",
            RunState::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// 配置完成后的运行组件
struct Prepared {
    config: ImportConfig,
    renderer: ContentRenderer,
    image_resolver: ImageResolver,
    pre_hook: Option<Box<dyn PreCreateHook>>,
    post_hook: Option<Box<dyn PostCreateHook>>,
}

// ==========================================
// ListingImporter - 导入编排器
// ==========================================
pub struct ListingImporter<S>
where
    S: ContentStore,
{
    store: S,
    state: RunState,
    prepared: Option<Prepared>,
    row_mapper: RowMapper,
    cancel: CancellationToken,
}

impl<S> ListingImporter<S>
where
    S: ContentStore,
{
    /// 创建导入器（Idle）
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: RunState::Idle,
            prepared: None,
            row_mapper: RowMapper::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 取消令牌（可交给其他线程, 行间检查）
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn expect_state(&self, expected: RunState) -> ImportResult<()> {
        if self.state != expected {
            return Err(ImportError::InvalidState {
                expected: expected.to_string(),
                actual: self.state.to_string(),
            });
        }
        Ok(())
    }

    /// 应用配置（Idle → Configuring）
    ///
    /// 加载覆盖模板并从注册表解析回调; 任一失败导入器保持 Idle
    pub fn configure(&mut self, config: ImportConfig, hooks: &mut HookRegistry) -> ImportResult<()> {
        self.expect_state(RunState::Idle)?;

        let renderer = ContentRenderer::with_overrides(config.template_overrides())?;
        let image_resolver = ImageResolver::new(config.upload_dir(), config.upload_base_url());

        let pre_hook = config
            .pre_create_callback()
            .map(|cb| hooks.take_pre(cb))
            .transpose()?;
        let post_hook = config
            .post_create_callback()
            .map(|cb| hooks.take_post(cb))
            .transpose()?;

        info!(
            mode = %config.mode().mode(),
            default_listing_type = %config.default_listing_type(),
            overrides = config.template_overrides().len(),
            pre_hook = pre_hook.is_some(),
            post_hook = post_hook.is_some(),
            "导入器配置完成"
        );

        self.prepared = Some(Prepared {
            config,
            renderer,
            image_resolver,
            pre_hook,
            post_hook,
        });
        self.state = RunState::Configuring;
        Ok(())
    }

    /// 直接设置前置回调（仅 Configuring 阶段）
    pub fn set_pre_create_hook<H>(&mut self, hook: H) -> ImportResult<()>
    where
        H: PreCreateHook + 'static,
    {
        self.expect_state(RunState::Configuring)?;
        if let Some(prepared) = self.prepared.as_mut() {
            prepared.pre_hook = Some(Box::new(hook));
        }
        Ok(())
    }

    /// 直接设置后置回调（仅 Configuring 阶段）
    pub fn set_post_create_hook<H>(&mut self, hook: H) -> ImportResult<()>
    where
        H: PostCreateHook + 'static,
    {
        self.expect_state(RunState::Configuring)?;
        if let Some(prepared) = self.prepared.as_mut() {
            prepared.post_hook = Some(Box::new(hook));
        }
        Ok(())
    }

    /// 执行导入（Configuring → Running → Done）
    ///
    /// # 返回
    /// - Ok(report): 正常结束或被取消
    /// - Err: 文件不可用 / 回调失败 / 开启中止策略时的落库失败
    #[instrument(skip(self, path), fields(run_id))]
    pub fn run<P: AsRef<Path>>(&mut self, path: P) -> ImportResult<ImportReport> {
        self.expect_state(RunState::Configuring)?;
        let mut prepared = self.prepared.take().ok_or_else(|| ImportError::InvalidState {
            expected: RunState::Configuring.to_string(),
            actual: "unconfigured".to_string(),
        })?;

        self.state = RunState::Running;
        let result = self.run_rows(&mut prepared, path.as_ref());
        self.state = RunState::Done;
        self.prepared = Some(prepared);
        result
    }

    fn run_rows(&self, prepared: &mut Prepared, path: &Path) -> ImportResult<ImportReport> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let mut source = RowSource::open(path)?;
        source
            .set_start(prepared.config.start())
            .set_end(prepared.config.end());

        let mode = prepared.config.mode();
        info!(
            run_id = %run_id,
            path = %path.display(),
            mode = %mode.mode(),
            start = prepared.config.start(),
            end = ?prepared.config.end(),
            "开始导入"
        );

        let mut summary = ImportSummary::default();
        let mut malformed_rows = Vec::new();
        let mut failed_rows = Vec::new();
        let mut cancelled = false;

        for item in source.rows()? {
            if self.cancel.is_cancelled() {
                warn!(processed = summary.processed, "导入已取消");
                cancelled = true;
                break;
            }

            let raw = match item {
                Ok(raw) => raw,
                Err(ImportError::MalformedRow { row, message }) => {
                    warn!(row_number = row, reason = %message, "行结构错误, 已跳过");
                    summary.malformed += 1;
                    malformed_rows.push(RowFailure {
                        row_number: row,
                        title: None,
                        reason: message,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let row_number = raw.row_number();
            let title = raw.title().map(str::to_string);

            match self.process_row(prepared, raw) {
                Ok((outcome, dropped)) => {
                    summary.dropped_images += dropped;
                    summary.record(&outcome.action);
                }
                Err(ImportError::MalformedRow { row, message }) => {
                    warn!(row_number = row, reason = %message, "行数据非法, 已跳过");
                    summary.malformed += 1;
                    malformed_rows.push(RowFailure {
                        row_number: row,
                        title,
                        reason: message,
                    });
                }
                Err(e @ ImportError::PersistenceError { .. })
                | Err(e @ ImportError::UploadError { .. })
                | Err(e @ ImportError::Repository(_)) => {
                    error!(row_number = row_number, title = ?title, error = %e, "行处理失败");
                    if prepared.config.abort_on_persistence_error() {
                        return Err(e);
                    }
                    summary.failed += 1;
                    failed_rows.push(RowFailure {
                        row_number,
                        title,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    error!(row_number = row_number, error = %e, "导入中止");
                    return Err(e);
                }
            }
        }

        let report = ImportReport {
            run_id,
            mode: mode.mode(),
            default_listing_type: prepared.config.default_listing_type(),
            summary,
            malformed_rows,
            failed_rows,
            cancelled,
            elapsed_ms: started.elapsed().as_millis(),
        };

        info!(
            run_id = %report.run_id,
            processed = report.summary.processed,
            created = report.summary.created,
            updated = report.summary.updated,
            unchanged = report.summary.unchanged,
            malformed = report.summary.malformed,
            failed = report.summary.failed,
            dropped_images = report.summary.dropped_images,
            elapsed_ms = report.elapsed_ms as u64,
            "导入完成"
        );
        Ok(report)
    }

    /// 处理单行, 返回结果与丢弃的图片数
    fn process_row(
        &self,
        prepared: &mut Prepared,
        raw: RawRow,
    ) -> ImportResult<(RowOutcome, usize)> {
        let mode = prepared.config.mode();
        let row_number = raw.row_number();

        // === 1. 前置回调 ===
        let mut row = raw.clone();
        if let Some(hook) = prepared.pre_hook.as_mut() {
            hook.before_create(&mut row, mode)
                .map_err(|e| ImportError::PreCreateHookFailed {
                    row: row_number,
                    message: format!("{:#}", e),
                })?;
        }

        // === 2. 行映射 ===
        let import_row = self.row_mapper.map(&row)?;

        // === 3. 列表类型 ===
        let listing_type = resolve_listing_type(&prepared.config, &import_row);

        // === 4. 图片 ===
        let images = if import_row.images.is_empty() {
            ResolvedImages::default()
        } else {
            prepared
                .image_resolver
                .resolve(&self.store, mode, &import_row.images)?
        };

        // === 5. 正文 ===
        let content = prepared
            .renderer
            .render(listing_type, &import_row.other_data, &images);

        // === 6. 组装字段 ===
        let author_id = self.resolve_author(import_row.post.author.as_ref(), mode)?;
        let incoming = assemble_listing(&import_row, listing_type, author_id, content, &images)?;

        // === 7. 查找已有条目（读失败归为仓储错误, 非落库失败） ===
        let existing = self
            .store
            .find_listing_by_title(&incoming.title, listing_type)?;

        // === 8. 按模式分支 ===
        let keep_existing_date = import_row.post.date.is_none();
        let (listing, action) = match existing {
            Some(existing) if mode.is_dry_run() => {
                let merged = existing.merged_with(&incoming, keep_existing_date);
                let changes = existing.diff(&merged);
                log_preview(row_number, &merged.title, &changes);
                let action = if changes.is_empty() {
                    RowAction::Unchanged
                } else {
                    RowAction::WouldUpdate { changes }
                };
                (merged, action)
            }
            None if mode.is_dry_run() => {
                match serde_json::to_string(&incoming) {
                    Ok(json) => info!(row_number, listing = %json, "预览: 将新建条目"),
                    Err(e) => warn!(row_number, error = %e, "预览序列化失败"),
                }
                (incoming, RowAction::WouldCreate)
            }
            Some(existing) if mode.is_skip() => {
                info!(row_number, title = %existing.title, "条目已存在");
                (existing, RowAction::Exists)
            }
            None if mode.is_skip() => {
                info!(row_number, title = %incoming.title, "条目不存在");
                (incoming, RowAction::Missing)
            }
            Some(existing) => self.update_existing(&existing, &incoming, keep_existing_date)?,
            None => self.insert_new(incoming)?,
        };

        // === 9. 后置回调 ===
        if let Some(hook) = prepared.post_hook.as_mut() {
            hook.after_create(&listing, mode, &raw)
                .map_err(|e| ImportError::PostCreateHookFailed {
                    row: row_number,
                    message: format!("{:#}", e),
                })?;
        }

        Ok((
            RowOutcome {
                row_number,
                listing,
                action,
            },
            images.dropped,
        ))
    }

    /// update: 合并到已有条目, 无变化时不写库
    fn update_existing(
        &self,
        existing: &Listing,
        incoming: &Listing,
        keep_existing_date: bool,
    ) -> ImportResult<(Listing, RowAction)> {
        let merged = existing.merged_with(incoming, keep_existing_date);
        let changes = existing.diff(&merged);

        if changes.is_empty() {
            debug!(listing_id = ?existing.id, title = %existing.title, "条目无变化");
            return Ok((merged, RowAction::Unchanged));
        }

        self.store
            .update_listing(&merged)
            .map_err(|e| ImportError::PersistenceError {
                title: merged.title.clone(),
                message: e.to_string(),
            })?;

        info!(
            listing_id = ?merged.id,
            title = %merged.title,
            changed = changes.len(),
            "条目已更新"
        );
        Ok((merged, RowAction::Updated { changes }))
    }

    /// update: 新建条目
    fn insert_new(&self, mut incoming: Listing) -> ImportResult<(Listing, RowAction)> {
        let id = self
            .store
            .insert_listing(&incoming)
            .map_err(|e| ImportError::PersistenceError {
                title: incoming.title.clone(),
                message: e.to_string(),
            })?;
        incoming.id = Some(id);

        info!(listing_id = id, title = %incoming.title, "条目已新建");
        Ok((incoming, RowAction::Created))
    }

    /// 作者解析: ID 直接使用; slug 查找, 不存在时创建（dry-run 不创建, 记为 0）
    fn resolve_author(&self, author: Option<&AuthorRef>, mode: ImporterMode) -> ImportResult<i64> {
        let slug = match author {
            None => return Ok(DEFAULT_AUTHOR_ID),
            Some(AuthorRef::Id(id)) => return Ok(*id),
            Some(AuthorRef::Slug(slug)) => slug,
        };

        if let Some(id) = self.store.find_user_by_slug(slug)? {
            return Ok(id);
        }

        if mode.is_dry_run() {
            debug!(slug = %slug, "预览: 作者不存在, 不创建");
            return Ok(0);
        }

        let id = self.store.create_user(slug)?;
        info!(slug = %slug, user_id = id, "已创建作者");
        Ok(id)
    }
}

/// 外部标签 → 列表类型（未映射/缺失时回退默认类型）
fn resolve_listing_type(config: &ImportConfig, row: &ImportRow) -> ListingType {
    let Some(label) = row.external_label() else {
        return config.default_listing_type();
    };

    match config.type_mapper().get_listing_type(label) {
        Ok(listing_type) => listing_type,
        Err(e) => {
            debug!(
                row_number = row.row_number,
                label = %e.0,
                fallback = %config.default_listing_type(),
                "未找到类型映射, 使用默认类型"
            );
            config.default_listing_type()
        }
    }
}

/// 组装待写入条目
fn assemble_listing(
    row: &ImportRow,
    listing_type: ListingType,
    author_id: i64,
    content: String,
    images: &ResolvedImages,
) -> ImportResult<Listing> {
    let date = match row.post.date {
        Some(ts) => epoch_to_naive(ts).ok_or_else(|| ImportError::MalformedRow {
            row: row.row_number,
            message: format!("post_date 超出范围: {}", ts),
        })?,
        None => now_naive(),
    };

    let mut meta = BTreeMap::from([
        (META_PAGE_TEMPLATE.to_string(), PAGE_TEMPLATE.to_string()),
        (
            META_FEATURED_IMAGE_POSITION.to_string(),
            FEATURED_IMAGE_POSITION.to_string(),
        ),
    ]);
    if let Some(asset_id) = images.featured.as_ref().and_then(|f| f.asset_id) {
        meta.insert(META_THUMBNAIL_ID.to_string(), asset_id.to_string());
    }

    Ok(Listing {
        id: None,
        listing_type,
        title: row
            .post
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        date,
        status: row
            .post
            .status
            .clone()
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        excerpt: row.post.excerpt.clone().unwrap_or_default(),
        content,
        author_id,
        meta,
        extra: row
            .post
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    })
}

fn epoch_to_naive(ts: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.naive_utc())
}

/// 当前 UTC 时间（精确到秒, 与存储格式一致）
fn now_naive() -> NaiveDateTime {
    let now = Utc::now().timestamp();
    epoch_to_naive(now).unwrap_or_else(|| Utc::now().naive_utc())
}

/// dry-run: 以 JSON 输出字段级差异
fn log_preview(row_number: usize, title: &str, changes: &[FieldChange]) {
    match serde_json::to_string(changes) {
        Ok(json) => info!(row_number, title = %title, changes = %json, "预览: 已有条目差异"),
        Err(e) => warn!(row_number, error = %e, "预览序列化失败"),
    }
}
