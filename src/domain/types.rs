// ==========================================
// 分类信息导入系统 - 领域类型定义
// ==========================================
// 职责: 列表类型 / 市场子类型 / 导入模式
// 红线: 列表类型为封闭枚举, curated_list 不可导入
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 列表类型 (Listing Type)
// ==========================================
// 序列化格式: snake_case (与命令行参数一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Generic,     // 通用
    Event,       // 活动
    Marketplace, // 市场
    Place,       // 地点
}

impl ListingType {
    /// 全部可导入类型（固定顺序）
    pub const ALL: [ListingType; 4] = [
        ListingType::Generic,
        ListingType::Event,
        ListingType::Marketplace,
        ListingType::Place,
    ];

    /// 短名称（命令行参数/配置文件使用）
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Generic => "generic",
            ListingType::Event => "event",
            ListingType::Marketplace => "marketplace",
            ListingType::Place => "place",
        }
    }

    /// 内容库中的 post_type 标识
    pub fn post_type(&self) -> &'static str {
        match self {
            ListingType::Generic => "newspack_lst_generic",
            ListingType::Event => "newspack_lst_event",
            ListingType::Marketplace => "newspack_lst_mktplce",
            ListingType::Place => "newspack_lst_place",
        }
    }

    /// 从 post_type 标识反查类型
    pub fn from_post_type(post_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.post_type() == post_type)
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 列表类型解析失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseListingTypeError(pub String);

impl fmt::Display for ParseListingTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == "curated_list" {
            write!(f, "curated_list 为聚合类型，不可导入")
        } else {
            write!(
                f,
                "未知列表类型: {}（可选: generic/event/marketplace/place）",
                self.0
            )
        }
    }
}

impl std::error::Error for ParseListingTypeError {}

impl FromStr for ListingType {
    type Err = ParseListingTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(ListingType::Generic),
            "event" => Ok(ListingType::Event),
            "marketplace" => Ok(ListingType::Marketplace),
            "place" => Ok(ListingType::Place),
            other => Err(ParseListingTypeError(other.to_string())),
        }
    }
}

// ==========================================
// 市场子类型 (Marketplace Type)
// ==========================================
// 仅 marketplace 列表使用, 决定渲染模板
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketplaceType {
    Classified, // 分类广告（精简字段）
    RealEstate, // 房产（完整字段）
}

impl MarketplaceType {
    /// 从行数据中的 marketplace_type 字段判定（大小写不敏感）
    ///
    /// 非 "classified" 的任何值（含缺失）均视为房产
    pub fn from_field(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().to_lowercase() == "classified" => MarketplaceType::Classified,
            _ => MarketplaceType::RealEstate,
        }
    }
}

// ==========================================
// 导入模式 (Mode)
// ==========================================
// 三种模式互斥, 每次导入运行设置一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    DryRun, // 仅预览, 不落库
    #[default]
    Update, // 新建或合并更新
    Skip,   // 仅报告是否存在
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::DryRun => "dry-run",
            Mode::Update => "update",
            Mode::Skip => "skip",
        }
    }

    /// 严格解析（大小写敏感）
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dry-run" => Some(Mode::DryRun),
            "update" => Some(Mode::Update),
            "skip" => Some(Mode::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
