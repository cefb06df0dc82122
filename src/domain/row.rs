// ==========================================
// 分类信息导入系统 - 行数据模型
// ==========================================
// 用途: 导入管道中间产物（文件读取 → RawRow → 行映射 → ImportRow）
// 生命周期: 仅在导入流程内
// ==========================================

use crate::domain::media::ImageRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 保留前缀: 以此开头的列直接映射到内容条目原生字段
pub const POST_FIELD_PREFIX: &str = "wp_post.";

/// 图片列名
pub const IMAGES_COLUMN: &str = "images";

/// 其他数据（非保留列），保持文件列顺序
pub type OtherData = IndexMap<String, String>;

// ==========================================
// RawRow - 原始行
// ==========================================
// 列名 → 原始值, 保持文件列顺序
// 前置钩子在此结构上原地修改
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    row_number: usize,
    columns: IndexMap<String, String>,
}

impl RawRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            columns: IndexMap::new(),
        }
    }

    /// 由列值对构造（测试与 JSONL 读取使用）
    pub fn from_pairs<I, K, V>(row_number: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            row_number,
            columns: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 原始文件中的数据行号（1 起，不含表头）
    pub fn row_number(&self) -> usize {
        self.row_number
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut String> {
        self.columns.get_mut(column)
    }

    /// 写入列值，返回旧值
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.columns.insert(column.into(), value.into())
    }

    pub fn remove(&mut self, column: &str) -> Option<String> {
        self.columns.shift_remove(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.columns.values_mut()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// 所有值均为空白
    pub fn is_blank(&self) -> bool {
        self.columns.values().all(|v| v.trim().is_empty())
    }

    /// 行标题（wp_post.post_title），用于日志与报告
    pub fn title(&self) -> Option<&str> {
        self.get("wp_post.post_title")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

// ==========================================
// AuthorRef - 作者引用
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorRef {
    Id(i64),      // 已知用户 ID
    Slug(String), // 用户 slug（不存在时创建）
}

// ==========================================
// PostFields - 保留列（原生字段）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostFields {
    pub title: Option<String>,
    pub author: Option<AuthorRef>,
    pub date: Option<i64>, // Unix 时间戳（秒）
    pub excerpt: Option<String>,
    pub status: Option<String>,
    pub post_type: Option<String>, // 外部类型标签
    pub extra: IndexMap<String, String>, // 其他 wp_post.* 列（去前缀）
}

// ==========================================
// ImportRow - 已校验行
// ==========================================
// 行解析时一次性校验, 后续各阶段不再解释原始字符串
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    pub row_number: usize,
    pub post: PostFields,
    pub other_data: OtherData,
    pub images: Vec<ImageRef>,
}

impl ImportRow {
    /// 外部类型标签（空串视为缺失）
    pub fn external_label(&self) -> Option<&str> {
        self.post
            .post_type
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }
}
