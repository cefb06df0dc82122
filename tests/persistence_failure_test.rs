// ==========================================
// 落库失败处理测试
// ==========================================
// 测试目标: 默认逐行上报继续; 开启中止策略时立即终止
// ==========================================

mod test_helpers;

use listing_importer::config::ImportConfigBuilder;
use listing_importer::domain::listing::Listing;
use listing_importer::domain::media::{MediaAsset, NewMediaAsset};
use listing_importer::domain::types::{ListingType, Mode};
use listing_importer::importer::{HookRegistry, ImportError, ListingImporter};
use listing_importer::repository::{
    ListingRepository, MediaRepository, RepositoryError, RepositoryResult, SqliteContentStore,
    UserRepository,
};
use test_helpers::TestEnv;

/// 对指定标题的写入返回错误的内容库
#[derive(Clone)]
struct FlakyStore {
    inner: SqliteContentStore,
    broken_title: &'static str,
    lookup_broken: bool, // 查询（读）同样失败
}

impl FlakyStore {
    fn check(&self, listing: &Listing) -> RepositoryResult<()> {
        if listing.title == self.broken_title {
            return Err(RepositoryError::DatabaseQueryError(
                "disk I/O error".to_string(),
            ));
        }
        Ok(())
    }
}

impl ListingRepository for FlakyStore {
    fn find_listing_by_title(
        &self,
        title: &str,
        listing_type: ListingType,
    ) -> RepositoryResult<Option<Listing>> {
        if self.lookup_broken && title == self.broken_title {
            return Err(RepositoryError::DatabaseQueryError(
                "database disk image is malformed".to_string(),
            ));
        }
        self.inner.find_listing_by_title(title, listing_type)
    }

    fn get_listing(&self, id: i64) -> RepositoryResult<Option<Listing>> {
        self.inner.get_listing(id)
    }

    fn insert_listing(&self, listing: &Listing) -> RepositoryResult<i64> {
        self.check(listing)?;
        self.inner.insert_listing(listing)
    }

    fn update_listing(&self, listing: &Listing) -> RepositoryResult<()> {
        self.check(listing)?;
        self.inner.update_listing(listing)
    }

    fn count_listings(&self) -> RepositoryResult<usize> {
        self.inner.count_listings()
    }
}

impl MediaRepository for FlakyStore {
    fn find_asset_by_title(&self, title: &str) -> RepositoryResult<Option<MediaAsset>> {
        self.inner.find_asset_by_title(title)
    }

    fn insert_asset(&self, asset: &NewMediaAsset) -> RepositoryResult<MediaAsset> {
        self.inner.insert_asset(asset)
    }

    fn update_asset_metadata(
        &self,
        id: i64,
        metadata: &serde_json::Value,
    ) -> RepositoryResult<()> {
        self.inner.update_asset_metadata(id, metadata)
    }

    fn count_assets(&self) -> RepositoryResult<usize> {
        self.inner.count_assets()
    }
}

impl UserRepository for FlakyStore {
    fn find_user_by_slug(&self, slug: &str) -> RepositoryResult<Option<i64>> {
        self.inner.find_user_by_slug(slug)
    }

    fn create_user(&self, slug: &str) -> RepositoryResult<i64> {
        self.inner.create_user(slug)
    }
}

const ROWS: &str = "wp_post.post_title\nFirst\nBroken\nLast\n";

fn flaky_importer(env: &TestEnv, builder: &ImportConfigBuilder) -> ListingImporter<FlakyStore> {
    importer_for(env, builder, false)
}

fn importer_for(
    env: &TestEnv,
    builder: &ImportConfigBuilder,
    lookup_broken: bool,
) -> ListingImporter<FlakyStore> {
    let store = FlakyStore {
        inner: env.store.clone(),
        broken_title: "Broken",
        lookup_broken,
    };
    let mut importer = ListingImporter::new(store);
    importer
        .configure(builder.build().unwrap(), &mut HookRegistry::new())
        .unwrap();
    importer
}

#[test]
fn test_persistence_failure_reported_and_run_continues() {
    let env = TestEnv::new();
    let file = env.write_file("rows.csv", ROWS);

    let report = flaky_importer(&env, &env.builder(Mode::Update))
        .run(&file)
        .unwrap();

    assert_eq!(report.summary.created, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.failed_rows.len(), 1);
    assert_eq!(report.failed_rows[0].row_number, 2);
    assert_eq!(report.failed_rows[0].title.as_deref(), Some("Broken"));
    assert!(report.failed_rows[0].reason.contains("Broken"));
    assert_eq!(env.store.count_listings().unwrap(), 2);
}

#[test]
fn test_abort_on_persistence_error() {
    let env = TestEnv::new();
    let file = env.write_file("rows.csv", ROWS);
    let mut builder = env.builder(Mode::Update);
    builder.abort_on_persistence_error(true);

    let err = flaky_importer(&env, &builder).run(&file).unwrap_err();

    assert!(matches!(err, ImportError::PersistenceError { ref title, .. } if title == "Broken"));
    assert_eq!(env.store.count_listings().unwrap(), 1);
}

#[test]
fn test_dry_run_never_reports_persistence_errors() {
    let env = TestEnv::new();
    let file = env.write_file("rows.csv", ROWS);

    let report = flaky_importer(&env, &env.builder(Mode::DryRun))
        .run(&file)
        .unwrap();

    assert_eq!(report.summary.would_create, 3);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(env.store.count_listings().unwrap(), 0);
}

#[test]
fn test_dry_run_lookup_failure_is_repository_error() {
    let env = TestEnv::new();
    let file = env.write_file("rows.csv", ROWS);

    // 默认: 记为行失败, 原因不是落库失败
    let report = importer_for(&env, &env.builder(Mode::DryRun), true)
        .run(&file)
        .unwrap();
    assert_eq!(report.summary.would_create, 2);
    assert_eq!(report.summary.failed, 1);
    let reason = &report.failed_rows[0].reason;
    assert!(reason.contains("database disk image is malformed"));
    assert!(!reason.contains("落库失败"));

    // 开启中止策略: 返回仓储错误而非 PersistenceError
    let mut builder = env.builder(Mode::DryRun);
    builder.abort_on_persistence_error(true);
    let err = importer_for(&env, &builder, true).run(&file).unwrap_err();
    assert!(matches!(err, ImportError::Repository(_)));
    assert_eq!(env.store.count_listings().unwrap(), 0);
}
