// ==========================================
// 分类信息导入系统 - 导入层
// ==========================================
// 职责: 外部文件 → 分类信息条目（创建或合并更新）
// 支持: CSV, JSON Lines, Excel
// ==========================================

// 模块声明
pub mod cancellation;
pub mod error;
pub mod hooks;
pub mod image_resolver;
pub mod importer_mode;
pub mod listing_importer;
pub mod renderer;
pub mod row_mapper;
pub mod row_source;
pub mod type_mapper;

// 重导出核心类型
pub use cancellation::CancellationToken;
pub use error::{ImportError, ImportResult};
pub use hooks::{HookRegistry, LogListing, PostCreateHook, PreCreateHook, RequireTitle, TrimValues};
pub use image_resolver::ImageResolver;
pub use importer_mode::ImporterMode;
pub use listing_importer::{ListingImporter, RunState};
pub use renderer::ContentRenderer;
pub use row_mapper::RowMapper;
pub use row_source::{FileFormat, RowSource};
pub use type_mapper::{ListingTypeMapper, NoMappingFound};
