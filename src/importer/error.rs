// ==========================================
// 分类信息导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分级:
// - 配置期致命: InvalidMode / CallableResolutionError / InvalidConfig / TemplateLoadError
// - 运行前致命: FileNotFound / UnsupportedFormat
// - 行级可恢复: MalformedRow（跳过该行）
// - 行级上报: PersistenceError（默认继续下一行）
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 配置错误 =====
    #[error("无效的导入模式: {0}（可选: dry-run/update/skip）")]
    InvalidMode(String),

    #[error("回调解析失败: {0}")]
    CallableResolutionError(String),

    #[error("配置值错误 (key: {key}): {message}")]
    InvalidConfig { key: String, message: String },

    #[error("模板加载失败 ({path}): {message}")]
    TemplateLoadError { path: String, message: String },

    #[error("导入器状态错误: 期望 {expected}，实际 {actual}")]
    InvalidState { expected: String, actual: String },

    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.jsonl/.ndjson/.xlsx/.xls）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 行级错误 =====
    #[error("行结构错误 (行 {row}): {message}")]
    MalformedRow { row: usize, message: String },

    #[error("前置回调失败 (行 {row}): {message}")]
    PreCreateHookFailed { row: usize, message: String },

    #[error("后置回调失败 (行 {row}): {message}")]
    PostCreateHookFailed { row: usize, message: String },

    #[error("落库失败 (标题: {title}): {message}")]
    PersistenceError { title: String, message: String },

    // ===== 媒体错误 =====
    #[error("图片上传失败 ({path}): {message}")]
    UploadError { path: String, message: String },

    // ===== 通用错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::InvalidConfig {
            key: "json".to_string(),
            message: err.to_string(),
        }
    }
}

impl ImportError {
    /// 行级可恢复错误（跳过该行继续）
    pub fn is_row_recoverable(&self) -> bool {
        matches!(self, ImportError::MalformedRow { .. })
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
