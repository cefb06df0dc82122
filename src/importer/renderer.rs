// ==========================================
// 分类信息导入系统 - 内容渲染器
// ==========================================
// 职责: 列表类型 + other_data + 图片 → 正文标记
// 规则:
// - 类型已登记覆盖模板: other_data 全部键逐字代入 {key}（键可含连字符/空格）
// - 否则使用内置模板, 仅代入该类型的固定字段集
// - 未匹配的占位符一律替换为空串
// ==========================================

use crate::domain::media::ResolvedImages;
use crate::domain::row::OtherData;
use crate::domain::types::{ListingType, MarketplaceType};
use crate::importer::error::{ImportError, ImportResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

// ===== 内置模板 =====
const FEATURED_IMAGE_TEMPLATE: &str = include_str!("../../templates/featured_image.html");
const GENERIC_TEMPLATE: &str = include_str!("../../templates/generic.html");
const EVENT_TEMPLATE: &str = include_str!("../../templates/event.html");
const PLACE_TEMPLATE: &str = include_str!("../../templates/place.html");
const CLASSIFIED_TEMPLATE: &str = include_str!("../../templates/marketplace/classified.html");
const REAL_ESTATE_TEMPLATE: &str = include_str!("../../templates/marketplace/real_estate.html");

// ===== 各模板固定字段集 =====
const GENERIC_FIELDS: &[&str] = &["html"];
const EVENT_FIELDS: &[&str] = &["start_date"];
const PLACE_FIELDS: &[&str] = &[
    "description",
    "email",
    "phone",
    "phone_display",
    "address_street",
    "address_city",
    "address_region",
    "address_postal",
];
const CLASSIFIED_FIELDS: &[&str] = &["price", "formatted_price", "description"];
const REAL_ESTATE_FIELDS: &[&str] = &[
    "email",
    "phone",
    "phone_display",
    "address_street",
    "address_city",
    "address_region",
    "address_postal",
    "price",
    "formatted_price",
    "show_decimals",
    "bedroom_count",
    "bathroom_count",
    "area",
    "area_measurement",
    "description",
    "property_details",
    "year_built",
    "garage",
    "basement",
    "heating",
    "cooling",
    "appliances",
];

/// 市场子类型字段名
pub const MARKETPLACE_TYPE_FIELD: &str = "marketplace_type";

#[derive(Debug, Clone, Default)]
pub struct ContentRenderer {
    overrides: BTreeMap<ListingType, String>,
}

impl ContentRenderer {
    /// 仅使用内置模板
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载覆盖模板（构造时一次性读入）
    ///
    /// # 返回
    /// - Err(TemplateLoadError): 任一覆盖模板不可读
    pub fn with_overrides(overrides: &BTreeMap<ListingType, PathBuf>) -> ImportResult<Self> {
        let mut loaded = BTreeMap::new();
        for (listing_type, path) in overrides {
            let body = fs::read_to_string(path).map_err(|e| ImportError::TemplateLoadError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            debug!(
                listing_type = %listing_type,
                path = %path.display(),
                "已加载覆盖模板"
            );
            loaded.insert(*listing_type, body);
        }
        Ok(Self { overrides: loaded })
    }

    pub fn has_override(&self, listing_type: ListingType) -> bool {
        self.overrides.contains_key(&listing_type)
    }

    /// 渲染正文
    pub fn render(
        &self,
        listing_type: ListingType,
        other_data: &OtherData,
        images: &ResolvedImages,
    ) -> String {
        if let Some(template) = self.overrides.get(&listing_type) {
            return substitute_exact(template, other_data);
        }

        let featured_image = self.render_featured_image(images);

        let (template, fields) = match listing_type {
            ListingType::Place => (PLACE_TEMPLATE, PLACE_FIELDS),
            ListingType::Event => (EVENT_TEMPLATE, EVENT_FIELDS),
            ListingType::Marketplace => {
                let sub_type = MarketplaceType::from_field(
                    other_data.get(MARKETPLACE_TYPE_FIELD).map(String::as_str),
                );
                match sub_type {
                    MarketplaceType::Classified => (CLASSIFIED_TEMPLATE, CLASSIFIED_FIELDS),
                    MarketplaceType::RealEstate => (REAL_ESTATE_TEMPLATE, REAL_ESTATE_FIELDS),
                }
            }
            ListingType::Generic => (GENERIC_TEMPLATE, GENERIC_FIELDS),
        };

        let mut values: HashMap<&str, &str> = fields
            .iter()
            .filter_map(|f| other_data.get(*f).map(|v| (*f, v.as_str())))
            .collect();
        values.insert("featured_image", featured_image.as_str());

        substitute(template, |key| values.get(key).copied())
    }

    /// 特色图片片段（无特色图片时为空）
    fn render_featured_image(&self, images: &ResolvedImages) -> String {
        let Some(featured) = &images.featured else {
            return String::new();
        };

        let id = featured.asset_id.map(|id| id.to_string()).unwrap_or_default();
        substitute(FEATURED_IMAGE_TEMPLATE, |key| match key {
            "id" => Some(id.as_str()),
            "url" => Some(featured.display_url()),
            _ => None,
        })
    }
}

/// 替换 `{ident}` 占位符（ident 由字母/数字/下划线组成）
///
/// 未解析的占位符替换为空串; 其他花括号（如块注释中的 JSON）原样保留
pub fn substitute<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let ident_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());

        if ident_len > 0 && after[ident_len..].starts_with('}') {
            let key = &after[..ident_len];
            out.push_str(lookup(key).unwrap_or(""));
            rest = &after[ident_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// 覆盖模板替换: `{key}` 与 other_data 的键逐字匹配
///
/// 未匹配的 `{...}` 若内容不含引号、冒号与空白则替换为空串; 其余花括号原样保留
pub fn substitute_exact(template: &str, data: &OtherData) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let body = after
            .find(|c: char| c == '{' || c == '}')
            .filter(|&close| after[close..].starts_with('}'))
            .map(|close| &after[..close]);

        if let Some(key) = body {
            if let Some(value) = data.get(key) {
                out.push_str(value);
                rest = &after[key.len() + 1..];
                continue;
            }
            if is_bare_token(key) {
                rest = &after[key.len() + 1..];
                continue;
            }
        }

        out.push('{');
        rest = after;
    }
    out.push_str(rest);
    out
}

/// 占位符形态: 非空, 不含引号/冒号/空白（排除 JSON 片段）
fn is_bare_token(body: &str) -> bool {
    !body.is_empty() && !body.chars().any(|c| c == '"' || c == ':' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::ResolvedImage;
    use indexmap::IndexMap;
    use std::io::Write;

    fn data(pairs: &[(&str, &str)]) -> OtherData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<IndexMap<_, _>>()
    }

    /// 是否残留 {ident} 占位符
    fn has_placeholder(markup: &str) -> bool {
        substitute(markup, |_| Some("\u{0}")).contains('\u{0}')
    }

    #[test]
    fn test_substitute_ignores_json_braces() {
        let out = substitute(r#"<!-- wp:x {"a":{n}} --> {name} {} { x } {missing}"#, |k| {
            match k {
                "n" => Some("1"),
                "name" => Some("Bob"),
                _ => None,
            }
        });
        assert_eq!(out, r#"<!-- wp:x {"a":1} --> Bob {} { x } "#);
    }

    #[test]
    fn test_place_renders_all_fields_without_leftovers() {
        let other = data(&[
            ("description", "Cozy cafe"),
            ("email", "cafe@example.com"),
            ("phone", "+15551234"),
            ("phone_display", "(555) 1234"),
            ("address_city", "Springfield"),
            ("unrelated", "ignored-value"),
        ]);
        let markup = ContentRenderer::new().render(ListingType::Place, &other, &ResolvedImages::default());

        for (key, value) in &other {
            if key != "unrelated" {
                assert!(markup.contains(value.as_str()), "missing {}", key);
            }
        }
        assert!(!markup.contains("ignored-value"));
        assert!(!has_placeholder(&markup));
    }

    #[test]
    fn test_classified_marketplace_uses_classified_template() {
        let other = data(&[
            ("marketplace_type", "Classified"),
            ("price", "100"),
            ("formatted_price", "$100"),
            ("description", "Bike for sale"),
            ("bedroom_count", "3"),
        ]);
        let markup =
            ContentRenderer::new().render(ListingType::Marketplace, &other, &ResolvedImages::default());

        assert!(markup.contains("100"));
        assert!(markup.contains("Bike for sale"));
        assert!(!markup.contains("bedroom"));
        assert!(!has_placeholder(&markup));
    }

    #[test]
    fn test_real_estate_is_default_marketplace_template() {
        let other = data(&[("bedroom_count", "3"), ("year_built", "1999")]);
        let markup =
            ContentRenderer::new().render(ListingType::Marketplace, &other, &ResolvedImages::default());

        assert!(markup.contains("bedrooms\">3<"));
        assert!(markup.contains("1999"));
        assert!(!has_placeholder(&markup));
    }

    #[test]
    fn test_featured_image_fragment() {
        let images = ResolvedImages {
            featured: Some(ResolvedImage {
                key: None,
                source_path: "/tmp/a.jpg".to_string(),
                asset_id: Some(17),
                url: Some("/uploads/2024/05/a.jpg".to_string()),
                reused: true,
            }),
            gallery: vec![],
            dropped: 0,
        };
        let markup = ContentRenderer::new().render(ListingType::Generic, &data(&[("html", "<b>x</b>")]), &images);

        assert!(markup.contains("wp-image-17"));
        assert!(markup.contains("/uploads/2024/05/a.jpg"));
        assert!(markup.contains("<b>x</b>"));

        let without = ContentRenderer::new().render(
            ListingType::Generic,
            &data(&[("html", "<b>x</b>")]),
            &ResolvedImages::default(),
        );
        assert!(!without.contains("wp:image"));
    }

    #[test]
    fn test_override_substitutes_every_key() {
        let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
        write!(file, "<h1>{{title_line}}</h1><p>{{price}}</p><i>{{unknown}}</i>").unwrap();

        let overrides = BTreeMap::from([(ListingType::Event, file.path().to_path_buf())]);
        let renderer = ContentRenderer::with_overrides(&overrides).unwrap();
        assert!(renderer.has_override(ListingType::Event));

        let markup = renderer.render(
            ListingType::Event,
            &data(&[("title_line", "Concert"), ("price", "20")]),
            &ResolvedImages::default(),
        );
        assert_eq!(markup, "<h1>Concert</h1><p>20</p><i></i>");
    }

    #[test]
    fn test_override_matches_keys_with_hyphens_and_spaces() {
        let mut file = tempfile::Builder::new().suffix(".html").tempfile().unwrap();
        write!(
            file,
            r#"<p>{{start-date}}</p><p>{{Venue Name}}</p><i>{{no-such-key}}</i><s>{{"a":1}}</s>{{ x }}"#
        )
        .unwrap();

        let overrides = BTreeMap::from([(ListingType::Event, file.path().to_path_buf())]);
        let markup = ContentRenderer::with_overrides(&overrides).unwrap().render(
            ListingType::Event,
            &data(&[("start-date", "2024-07-01"), ("Venue Name", "Harbor Hall")]),
            &ResolvedImages::default(),
        );
        assert_eq!(
            markup,
            r#"<p>2024-07-01</p><p>Harbor Hall</p><i></i><s>{"a":1}</s>{ x }"#
        );
    }

    #[test]
    fn test_missing_override_file_fails_at_construction() {
        let overrides = BTreeMap::from([(ListingType::Place, PathBuf::from("/no/such/template.html"))]);
        let err = ContentRenderer::with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, ImportError::TemplateLoadError { .. }));
    }
}
