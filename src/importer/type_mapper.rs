// ==========================================
// 分类信息导入系统 - 列表类型映射器
// ==========================================
// 职责: 外部类型标签 → 内部列表类型
// 规则:
// - 标签精确匹配（大小写敏感）
// - 同一标签重复登记到不同类型时, 后写覆盖（记录告警）
// - 未登记标签返回 NoMappingFound, 由调用方回退到默认类型
// ==========================================

use crate::domain::types::ListingType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::warn;

/// 未找到映射（调用方回退到默认类型）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未找到类型映射: {0}")]
pub struct NoMappingFound(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingTypeMapper {
    labels: BTreeMap<String, ListingType>,
}

impl ListingTypeMapper {
    /// 空映射表
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置内部 post_type 标识的映射表
    pub fn with_builtin_labels() -> Self {
        let mut mapper = Self::new();
        for t in ListingType::ALL {
            mapper.set_types(t, [t.post_type()]);
        }
        mapper
    }

    /// 登记/覆盖路由到 listing_type 的外部标签
    ///
    /// 空白标签被忽略; 标签两端空白被去除
    pub fn set_types<I, S>(&mut self, listing_type: ListingType, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() {
                continue;
            }
            if let Some(previous) = self.labels.insert(label.to_string(), listing_type) {
                if previous != listing_type {
                    warn!(
                        label = %label,
                        previous = %previous,
                        current = %listing_type,
                        "外部类型标签被重新映射（后写覆盖）"
                    );
                }
            }
        }
    }

    /// 查询外部标签对应的列表类型
    pub fn get_listing_type(&self, label: &str) -> Result<ListingType, NoMappingFound> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| NoMappingFound(label.to_string()))
    }

    /// 某类型当前登记的全部标签
    pub fn labels_for(&self, listing_type: ListingType) -> BTreeSet<&str> {
        self.labels
            .iter()
            .filter(|(_, t)| **t == listing_type)
            .map(|(l, _)| l.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_label_resolves() {
        let mut mapper = ListingTypeMapper::new();
        mapper.set_types(ListingType::Marketplace, ["market_raw", "classifieds"]);
        mapper.set_types(ListingType::Event, ["tribe_events"]);

        assert_eq!(
            mapper.get_listing_type("market_raw"),
            Ok(ListingType::Marketplace)
        );
        assert_eq!(
            mapper.get_listing_type("tribe_events"),
            Ok(ListingType::Event)
        );
    }

    #[test]
    fn test_unmapped_and_case_mismatch() {
        let mut mapper = ListingTypeMapper::new();
        mapper.set_types(ListingType::Place, ["venue"]);

        assert_eq!(
            mapper.get_listing_type("Venue"),
            Err(NoMappingFound("Venue".to_string()))
        );
        assert!(mapper.get_listing_type("unknown").is_err());
    }

    #[test]
    fn test_reassignment_last_write_wins() {
        let mut mapper = ListingTypeMapper::new();
        mapper.set_types(ListingType::Place, ["shared"]);
        mapper.set_types(ListingType::Event, ["shared"]);

        assert_eq!(mapper.get_listing_type("shared"), Ok(ListingType::Event));
        assert!(mapper.labels_for(ListingType::Place).is_empty());
    }

    #[test]
    fn test_builtin_labels_and_blank_labels() {
        let mut mapper = ListingTypeMapper::with_builtin_labels();
        assert_eq!(
            mapper.get_listing_type("newspack_lst_mktplce"),
            Ok(ListingType::Marketplace)
        );

        let before = mapper.len();
        mapper.set_types(ListingType::Generic, ["", "  ", " post "]);
        assert_eq!(mapper.len(), before + 1);
        assert_eq!(mapper.get_listing_type("post"), Ok(ListingType::Generic));
    }
}
