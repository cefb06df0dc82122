// ==========================================
// 分类信息导入系统 - 配置层
// ==========================================
// 职责: 导入运行配置（默认值 → 配置文件 → 命令行）
// 约束: 运行开始前冻结为不可变值
// ==========================================

pub mod import_config;

pub use import_config::{
    default_data_dir, default_db_path, default_upload_dir, ImportConfig, ImportConfigBuilder,
};
