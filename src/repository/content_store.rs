// ==========================================
// 分类信息导入系统 - 内容库 Repository Trait
// ==========================================
// 职责: 定义导入相关数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据读写
// 红线: 无行级锁, 正确性依赖单写者（单进程单次运行）
// ==========================================

use crate::domain::listing::Listing;
use crate::domain::media::{MediaAsset, NewMediaAsset};
use crate::domain::types::ListingType;
use crate::repository::error::RepositoryResult;

// ==========================================
// ListingRepository Trait
// ==========================================
// 实现者: SqliteContentStore
pub trait ListingRepository: Send + Sync {
    /// 按标题精确查找（限定类型）
    ///
    /// # 返回
    /// - Ok(Some(listing)): 同标题多条时返回最早创建的一条
    /// - Ok(None): 不存在
    fn find_listing_by_title(
        &self,
        title: &str,
        listing_type: ListingType,
    ) -> RepositoryResult<Option<Listing>>;

    /// 按 ID 查询
    fn get_listing(&self, id: i64) -> RepositoryResult<Option<Listing>>;

    /// 插入新条目，返回新 ID（忽略 listing.id）
    fn insert_listing(&self, listing: &Listing) -> RepositoryResult<i64>;

    /// 更新已有条目（listing.id 必须存在）
    fn update_listing(&self, listing: &Listing) -> RepositoryResult<()>;

    /// 统计条目数
    fn count_listings(&self) -> RepositoryResult<usize>;
}

// ==========================================
// MediaRepository Trait
// ==========================================
pub trait MediaRepository: Send + Sync {
    /// 按显示名查找资产
    fn find_asset_by_title(&self, title: &str) -> RepositoryResult<Option<MediaAsset>>;

    /// 创建资产记录
    fn insert_asset(&self, asset: &NewMediaAsset) -> RepositoryResult<MediaAsset>;

    /// 写入派生元数据
    fn update_asset_metadata(&self, id: i64, metadata: &serde_json::Value)
        -> RepositoryResult<()>;

    /// 统计资产数
    fn count_assets(&self) -> RepositoryResult<usize>;
}

// ==========================================
// UserRepository Trait
// ==========================================
pub trait UserRepository: Send + Sync {
    /// 按 slug 查找用户 ID
    fn find_user_by_slug(&self, slug: &str) -> RepositoryResult<Option<i64>>;

    /// 创建用户，返回新 ID
    fn create_user(&self, slug: &str) -> RepositoryResult<i64>;
}

/// 导入器所需的完整内容库能力
pub trait ContentStore: ListingRepository + MediaRepository + UserRepository {}

impl<T> ContentStore for T where T: ListingRepository + MediaRepository + UserRepository {}
