// ==========================================
// 分类信息导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod listing;
pub mod media;
pub mod report;
pub mod row;
pub mod types;

// 重导出核心类型
pub use listing::{FieldChange, Listing};
pub use media::{ImageRef, MediaAsset, NewMediaAsset, ResolvedImage, ResolvedImages};
pub use report::{ImportReport, ImportSummary, RowAction, RowFailure, RowOutcome};
pub use row::{AuthorRef, ImportRow, OtherData, PostFields, RawRow};
pub use types::{ListingType, MarketplaceType, Mode};
