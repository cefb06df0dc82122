// ==========================================
// 分类信息导入系统 - 媒体领域模型
// ==========================================
// 职责: 图片引用 / 解析结果 / 媒体资产记录
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 特色图片键名
pub const FEATURED_IMAGE_KEY: &str = "featured_image";

// ==========================================
// ImageRef - 图片引用（来自行数据）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub key: Option<String>, // None = 位置引用
    pub path: String,        // 源路径或 URL
}

impl ImageRef {
    pub fn positional(path: impl Into<String>) -> Self {
        Self {
            key: None,
            path: path.into(),
        }
    }

    pub fn keyed(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            path: path.into(),
        }
    }

    pub fn is_featured_key(&self) -> bool {
        self.key.as_deref() == Some(FEATURED_IMAGE_KEY)
    }

    /// 派生显示名（文件基名），用于复用已有资产
    pub fn display_name(&self) -> String {
        let trimmed = self.path.trim_end_matches('/');
        Path::new(trimmed)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| trimmed.to_string())
    }
}

// ==========================================
// ResolvedImage - 解析后的图片
// ==========================================
// asset_id / url 为 None 表示未解析（dry-run 透传）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub key: Option<String>,
    pub source_path: String,
    pub asset_id: Option<i64>,
    pub url: Option<String>,
    pub reused: bool, // 复用已有资产（未上传）
}

impl ResolvedImage {
    /// dry-run 透传
    pub fn unresolved(image: &ImageRef) -> Self {
        Self {
            key: image.key.clone(),
            source_path: image.path.clone(),
            asset_id: None,
            url: None,
            reused: false,
        }
    }

    pub fn from_asset(image: &ImageRef, asset: &MediaAsset, reused: bool) -> Self {
        Self {
            key: image.key.clone(),
            source_path: image.path.clone(),
            asset_id: Some(asset.id),
            url: Some(asset.url.clone()),
            reused,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.asset_id.is_some()
    }

    /// 渲染用 URL（未解析时回退到源路径）
    pub fn display_url(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.source_path)
    }
}

// ==========================================
// ResolvedImages - 一行的图片解析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImages {
    pub featured: Option<ResolvedImage>,
    pub gallery: Vec<ResolvedImage>,
    pub dropped: usize, // 源文件不可读而跳过的数量
}

impl ResolvedImages {
    pub fn is_empty(&self) -> bool {
        self.featured.is_none() && self.gallery.is_empty()
    }
}

// ==========================================
// MediaAsset - 媒体资产（内容库记录）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: i64,
    pub title: String,     // 显示名（文件基名）
    pub file_path: String, // 上传目录内的绝对路径
    pub url: String,       // 公开路径
    pub mime_type: String,
    pub metadata: Option<serde_json::Value>, // 派生元数据（仅 update 模式生成）
    pub created_at: DateTime<Utc>,
}

/// 待创建的媒体资产
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMediaAsset {
    pub title: String,
    pub file_path: String,
    pub url: String,
    pub mime_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_uses_basename() {
        assert_eq!(
            ImageRef::positional("/srv/photos/house-front.jpg").display_name(),
            "house-front.jpg"
        );
        assert_eq!(
            ImageRef::positional("https://cdn.example.com/a/b/pic.png").display_name(),
            "pic.png"
        );
        assert_eq!(ImageRef::positional("plain.gif").display_name(), "plain.gif");
    }

    #[test]
    fn test_featured_key_detection() {
        assert!(ImageRef::keyed(FEATURED_IMAGE_KEY, "a.jpg").is_featured_key());
        assert!(!ImageRef::keyed("cover", "a.jpg").is_featured_key());
        assert!(!ImageRef::positional("a.jpg").is_featured_key());
    }
}
