// ==========================================
// 分类信息导入系统 - 列表条目领域模型
// ==========================================
// 用途: 导入层写入的内容条目（创建或合并更新，从不删除）
// 对齐: listing 表
// ==========================================

use crate::domain::types::ListingType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 页面模板元数据键
pub const META_PAGE_TEMPLATE: &str = "_wp_page_template";
/// 特色图片位置元数据键
pub const META_FEATURED_IMAGE_POSITION: &str = "newspack_featured_image_position";

/// 日期输出格式
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// Listing - 内容条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Option<i64>, // None = 未持久化（dry-run 或待插入）
    pub listing_type: ListingType,
    pub title: String,
    pub date: NaiveDateTime,
    pub status: String,
    pub excerpt: String,
    pub content: String,
    pub author_id: i64,
    pub meta: BTreeMap<String, String>,
    pub extra: BTreeMap<String, String>, // 其他原生字段（如 post_name）
}

// ==========================================
// FieldChange - 字段级差异
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<String>,
    pub new: String,
}

impl Listing {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// 将传入字段合并到已有条目（传入值逐字段覆盖）
    ///
    /// # 参数
    /// - incoming: 由行数据组装的条目
    /// - keep_existing_date: 行未提供日期时保留原日期，保证重复导入无变化
    pub fn merged_with(&self, incoming: &Listing, keep_existing_date: bool) -> Listing {
        let mut merged = self.clone();
        merged.listing_type = incoming.listing_type;
        merged.title = incoming.title.clone();
        if !keep_existing_date {
            merged.date = incoming.date;
        }
        merged.status = incoming.status.clone();
        merged.excerpt = incoming.excerpt.clone();
        merged.content = incoming.content.clone();
        merged.author_id = incoming.author_id;
        for (k, v) in &incoming.meta {
            merged.meta.insert(k.clone(), v.clone());
        }
        for (k, v) in &incoming.extra {
            merged.extra.insert(k.clone(), v.clone());
        }
        merged
    }

    /// 计算 self → other 的字段变化
    pub fn diff(&self, other: &Listing) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        let mut push = |field: &str, old: String, new: String| {
            if old != new {
                changes.push(FieldChange {
                    field: field.to_string(),
                    old: Some(old),
                    new,
                });
            }
        };

        push(
            "post_type",
            self.listing_type.post_type().to_string(),
            other.listing_type.post_type().to_string(),
        );
        push("post_title", self.title.clone(), other.title.clone());
        push(
            "post_date",
            self.date.format(DATE_FORMAT).to_string(),
            other.date.format(DATE_FORMAT).to_string(),
        );
        push("post_status", self.status.clone(), other.status.clone());
        push("post_excerpt", self.excerpt.clone(), other.excerpt.clone());
        push("post_content", self.content.clone(), other.content.clone());
        push(
            "post_author",
            self.author_id.to_string(),
            other.author_id.to_string(),
        );

        for (prefix, mine, theirs) in [
            ("meta", &self.meta, &other.meta),
            ("extra", &self.extra, &other.extra),
        ] {
            for (k, v) in theirs {
                if mine.get(k) != Some(v) {
                    changes.push(FieldChange {
                        field: format!("{}.{}", prefix, k),
                        old: mine.get(k).cloned(),
                        new: v.clone(),
                    });
                }
            }
        }

        changes
    }
}
