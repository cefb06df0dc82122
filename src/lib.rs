// ==========================================
// 分类信息导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 批量导入工具（预览 / 合并更新 / 存在性检查）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 运行配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 命令行参数
pub mod cli;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ListingType, MarketplaceType, Mode};

// 领域实体
pub use domain::{ImportReport, ImportSummary, Listing, MediaAsset, RawRow, RowAction};

// 配置
pub use config::{ImportConfig, ImportConfigBuilder};

// 导入器
pub use importer::{
    CancellationToken, HookRegistry, ImportError, ImportResult, ListingImporter, ListingTypeMapper,
};

// 仓储
pub use repository::{ContentStore, SqliteContentStore};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "listing-importer";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
