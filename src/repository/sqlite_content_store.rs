// ==========================================
// 分类信息导入系统 - 内容库 Repository 实现
// ==========================================
// 职责: 实现条目/媒体/用户数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据读写
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::listing::{Listing, DATE_FORMAT};
use crate::domain::media::{MediaAsset, NewMediaAsset};
use crate::domain::types::ListingType;
use crate::repository::content_store::{ListingRepository, MediaRepository, UserRepository};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

const LISTING_COLUMNS: &str =
    "id, post_type, title, post_date, status, excerpt, content, author_id, meta_json, extra_json";

const ASSET_COLUMNS: &str = "id, title, file_path, url, mime_type, metadata_json, created_at";

// ==========================================
// 表行 → 领域对象（两段式，便于错误归类）
// ==========================================
struct ListingRecord {
    id: i64,
    post_type: String,
    title: String,
    post_date: String,
    status: String,
    excerpt: String,
    content: String,
    author_id: i64,
    meta_json: String,
    extra_json: String,
}

impl ListingRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_type: row.get(1)?,
            title: row.get(2)?,
            post_date: row.get(3)?,
            status: row.get(4)?,
            excerpt: row.get(5)?,
            content: row.get(6)?,
            author_id: row.get(7)?,
            meta_json: row.get(8)?,
            extra_json: row.get(9)?,
        })
    }

    fn into_listing(self) -> RepositoryResult<Listing> {
        let listing_type = ListingType::from_post_type(&self.post_type).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "post_type".to_string(),
                message: format!("未知 post_type: {}", self.post_type),
            }
        })?;
        let date = NaiveDateTime::parse_from_str(&self.post_date, DATE_FORMAT).map_err(|e| {
            RepositoryError::FieldValueError {
                field: "post_date".to_string(),
                message: format!("{} ({})", e, self.post_date),
            }
        })?;
        let meta: BTreeMap<String, String> = serde_json::from_str(&self.meta_json)?;
        let extra: BTreeMap<String, String> = serde_json::from_str(&self.extra_json)?;

        Ok(Listing {
            id: Some(self.id),
            listing_type,
            title: self.title,
            date,
            status: self.status,
            excerpt: self.excerpt,
            content: self.content,
            author_id: self.author_id,
            meta,
            extra,
        })
    }
}

struct AssetRecord {
    id: i64,
    title: String,
    file_path: String,
    url: String,
    mime_type: String,
    metadata_json: Option<String>,
    created_at: String,
}

impl AssetRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            file_path: row.get(2)?,
            url: row.get(3)?,
            mime_type: row.get(4)?,
            metadata_json: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_asset(self) -> RepositoryResult<MediaAsset> {
        let metadata = match self.metadata_json {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        };
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::FieldValueError {
                field: "created_at".to_string(),
                message: e.to_string(),
            })?;

        Ok(MediaAsset {
            id: self.id,
            title: self.title,
            file_path: self.file_path,
            url: self.url,
            mime_type: self.mime_type,
            metadata,
            created_at,
        })
    }
}

// ==========================================
// SqliteContentStore
// ==========================================
#[derive(Clone)]
pub struct SqliteContentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteContentStore {
    /// 打开（或创建）内容库并初始化 schema
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存库（测试/预览使用）
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        configure_sqlite_connection(&conn)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（会再次应用统一 PRAGMA 与 schema，幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }

        Ok(Self { conn })
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl ListingRepository for SqliteContentStore {
    fn find_listing_by_title(
        &self,
        title: &str,
        listing_type: ListingType,
    ) -> RepositoryResult<Option<Listing>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM listing WHERE post_type = ?1 AND title = ?2 ORDER BY id LIMIT 1",
            LISTING_COLUMNS
        );
        let record = conn
            .query_row(
                &sql,
                params![listing_type.post_type(), title],
                ListingRecord::from_row,
            )
            .optional()?;

        record.map(ListingRecord::into_listing).transpose()
    }

    fn get_listing(&self, id: i64) -> RepositoryResult<Option<Listing>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM listing WHERE id = ?1", LISTING_COLUMNS);
        let record = conn
            .query_row(&sql, params![id], ListingRecord::from_row)
            .optional()?;

        record.map(ListingRecord::into_listing).transpose()
    }

    fn insert_listing(&self, listing: &Listing) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO listing (
                post_type, title, post_date, status, excerpt, content,
                author_id, meta_json, extra_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                listing.listing_type.post_type(),
                listing.title,
                listing.date.format(DATE_FORMAT).to_string(),
                listing.status,
                listing.excerpt,
                listing.content,
                listing.author_id,
                serde_json::to_string(&listing.meta)?,
                serde_json::to_string(&listing.extra)?,
                now,
                now,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn update_listing(&self, listing: &Listing) -> RepositoryResult<()> {
        let id = listing.id.ok_or_else(|| RepositoryError::FieldValueError {
            field: "id".to_string(),
            message: "更新条目缺少 ID".to_string(),
        })?;

        let conn = self.lock()?;
        let affected = conn.execute(
            r#"
            UPDATE listing SET
                post_type = ?1, title = ?2, post_date = ?3, status = ?4,
                excerpt = ?5, content = ?6, author_id = ?7,
                meta_json = ?8, extra_json = ?9, updated_at = ?10
            WHERE id = ?11
            "#,
            params![
                listing.listing_type.post_type(),
                listing.title,
                listing.date.format(DATE_FORMAT).to_string(),
                listing.status,
                listing.excerpt,
                listing.content,
                listing.author_id,
                serde_json::to_string(&listing.meta)?,
                serde_json::to_string(&listing.extra)?,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "listing".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn count_listings(&self) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM listing", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl MediaRepository for SqliteContentStore {
    fn find_asset_by_title(&self, title: &str) -> RepositoryResult<Option<MediaAsset>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM media_asset WHERE title = ?1 ORDER BY id LIMIT 1",
            ASSET_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![title], AssetRecord::from_row)
            .optional()?;

        record.map(AssetRecord::into_asset).transpose()
    }

    fn insert_asset(&self, asset: &NewMediaAsset) -> RepositoryResult<MediaAsset> {
        let conn = self.lock()?;
        let created_at = Utc::now();

        conn.execute(
            r#"
            INSERT INTO media_asset (title, file_path, url, mime_type, metadata_json, created_at)
            VALUES (?1, ?2, ?3, ?4, NULL, ?5)
            "#,
            params![
                asset.title,
                asset.file_path,
                asset.url,
                asset.mime_type,
                created_at.to_rfc3339(),
            ],
        )?;

        Ok(MediaAsset {
            id: conn.last_insert_rowid(),
            title: asset.title.clone(),
            file_path: asset.file_path.clone(),
            url: asset.url.clone(),
            mime_type: asset.mime_type.clone(),
            metadata: None,
            created_at,
        })
    }

    fn update_asset_metadata(
        &self,
        id: i64,
        metadata: &serde_json::Value,
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "UPDATE media_asset SET metadata_json = ?1 WHERE id = ?2",
            params![serde_json::to_string(metadata)?, id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "media_asset".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn count_assets(&self) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM media_asset", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl UserRepository for SqliteContentStore {
    fn find_user_by_slug(&self, slug: &str) -> RepositoryResult<Option<i64>> {
        let conn = self.lock()?;
        let id = conn
            .query_row(
                "SELECT id FROM app_user WHERE slug = ?1",
                params![slug],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn create_user(&self, slug: &str) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO app_user (slug, created_at) VALUES (?1, ?2)",
            params![slug, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
