// ==========================================
// 分类信息导入系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供内容库访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod content_store;
pub mod error;
pub mod sqlite_content_store;

// 重导出核心仓储
pub use content_store::{ContentStore, ListingRepository, MediaRepository, UserRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use sqlite_content_store::SqliteContentStore;
