// ==========================================
// 分类信息导入系统 - 行映射器
// ==========================================
// 职责: RawRow → ImportRow（一次性校验 + 类型转换）
// 规则:
// - wp_post.* 列 → PostFields（去前缀）
// - images 列 → Vec<ImageRef>
// - 其余列 → other_data（保持列顺序）
// ==========================================

use crate::domain::media::ImageRef;
use crate::domain::row::{AuthorRef, ImportRow, PostFields, RawRow, IMAGES_COLUMN, POST_FIELD_PREFIX};
use crate::importer::error::{ImportError, ImportResult};
use indexmap::IndexMap;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default)]
pub struct RowMapper;

impl RowMapper {
    pub fn new() -> Self {
        Self
    }

    /// 映射一行
    ///
    /// # 返回
    /// - Err(MalformedRow): 日期非整数时间戳 / images 结构非法
    pub fn map(&self, row: &RawRow) -> ImportResult<ImportRow> {
        let row_number = row.row_number();
        let mut post = PostFields::default();
        let mut other_data = IndexMap::new();
        let mut images = Vec::new();

        for (column, value) in row.iter() {
            if let Some(field) = column.strip_prefix(POST_FIELD_PREFIX) {
                self.map_post_field(&mut post, field, value, row_number)?;
            } else if column == IMAGES_COLUMN {
                images = parse_images(value, row_number)?;
            } else {
                other_data.insert(column.to_string(), value.to_string());
            }
        }

        Ok(ImportRow {
            row_number,
            post,
            other_data,
            images,
        })
    }

    fn map_post_field(
        &self,
        post: &mut PostFields,
        field: &str,
        value: &str,
        row_number: usize,
    ) -> ImportResult<()> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }

        match field {
            "post_title" => post.title = Some(value.to_string()),
            "post_author" => post.author = Some(parse_author(value)),
            "post_date" => post.date = Some(parse_epoch(value, row_number)?),
            "post_excerpt" => post.excerpt = Some(value.to_string()),
            "post_status" => post.status = Some(value.to_string()),
            "post_type" => post.post_type = Some(value.to_string()),
            other => {
                post.extra.insert(other.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

/// 纯数字 → 用户 ID, 否则视为 slug
fn parse_author(value: &str) -> AuthorRef {
    if value.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(id) = value.parse::<i64>() {
            return AuthorRef::Id(id);
        }
    }
    AuthorRef::Slug(value.to_string())
}

/// Unix 时间戳（秒）; Excel 数值单元格可能带 ".0"
fn parse_epoch(value: &str, row_number: usize) -> ImportResult<i64> {
    if let Ok(ts) = value.parse::<i64>() {
        return Ok(ts);
    }
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
        _ => Err(ImportError::MalformedRow {
            row: row_number,
            message: format!("post_date 不是整数时间戳: {}", value),
        }),
    }
}

// ==========================================
// images 列解析
// ==========================================
// 支持:
// - JSON 数组: ["a.jpg", {"path": "b.jpg"}]         → 位置引用
// - JSON 对象: {"featured_image": {"path": ...}, "0": ...} → 数字键为位置引用
// - 竖线分隔: a.jpg|b.jpg
pub fn parse_images(value: &str, row_number: usize) -> ImportResult<Vec<ImageRef>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }

    if !(value.starts_with('[') || value.starts_with('{')) {
        return Ok(value
            .split('|')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ImageRef::positional)
            .collect());
    }

    let malformed = |message: String| ImportError::MalformedRow {
        row: row_number,
        message,
    };

    let parsed: Value = serde_json::from_str(value)
        .map_err(|e| malformed(format!("images 列 JSON 非法: {}", e)))?;

    let mut images = Vec::new();
    match parsed {
        Value::Array(items) => {
            for item in &items {
                if let Some(path) = image_path(item).map_err(&malformed)? {
                    images.push(ImageRef::positional(path));
                }
            }
        }
        Value::Object(entries) => {
            // 数字键按数值排序（"10" 排在 "2" 之后）
            let mut positional: Vec<(u64, String)> = Vec::new();
            for (key, item) in &entries {
                let Some(path) = image_path(item).map_err(&malformed)? else {
                    continue;
                };
                match key.parse::<u64>() {
                    Ok(index) => positional.push((index, path)),
                    Err(_) => images.push(ImageRef::keyed(key.clone(), path)),
                }
            }
            positional.sort_by_key(|(index, _)| *index);
            images.extend(positional.into_iter().map(|(_, path)| ImageRef::positional(path)));
        }
        _ => return Err(malformed("images 列必须是数组或对象".to_string())),
    }

    Ok(images)
}

/// 单条图片记录: 字符串路径或 {"path": ...}; 空路径忽略
fn image_path(item: &Value) -> Result<Option<String>, String> {
    let path = match item {
        Value::String(s) => s.as_str(),
        Value::Object(map) => match map.get("path") {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Null) | None => {
                return Err("图片记录缺少 path 字段".to_string());
            }
            Some(other) => return Err(format!("图片 path 必须是字符串: {}", other)),
        },
        Value::Null => return Ok(None),
        other => return Err(format!("无法识别的图片记录: {}", other)),
    };

    let path = path.trim();
    Ok((!path.is_empty()).then(|| path.to_string()))
}
