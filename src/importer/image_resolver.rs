// ==========================================
// 分类信息导入系统 - 图片解析器
// ==========================================
// 职责: 图片引用 → 已有资产 / 上传新资产
// 规则（逐条）:
// a. 同显示名资产已存在 → 复用, 不上传
// b. dry-run → 原样透传（不访问磁盘, 不写库）
// c. 源文件可读 → 复制到 upload_dir/YYYY/MM/, 创建资产记录
//    仅 update 模式生成派生元数据（尺寸/MIME/大小/缩略图）
// 源文件不可读 → 跳过并计入 dropped
// 特色图片: featured_image 键优先, 否则首个位置引用
// ==========================================

use crate::domain::media::{
    ImageRef, MediaAsset, NewMediaAsset, ResolvedImage, ResolvedImages, FEATURED_IMAGE_KEY,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_mode::ImporterMode;
use crate::repository::MediaRepository;
use chrono::{Datelike, Utc};
use image::imageops::FilterType;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 缩略图边长（像素）
pub const THUMBNAIL_SIZE: u32 = 150;

#[derive(Debug, Clone)]
pub struct ImageResolver {
    upload_dir: PathBuf,
    base_url: String,
}

impl ImageResolver {
    /// # 参数
    /// - upload_dir: 受管上传目录（按需创建）
    /// - base_url: 上传目录对应的公开路径前缀
    pub fn new(upload_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// 解析一行的全部图片引用
    ///
    /// # 返回
    /// - Err(UploadError): 上传目录不可写
    /// - Err(Repository): 资产查询/写入失败
    pub fn resolve<S>(
        &self,
        store: &S,
        mode: ImporterMode,
        images: &[ImageRef],
    ) -> ImportResult<ResolvedImages>
    where
        S: MediaRepository + ?Sized,
    {
        let mut resolved = Vec::with_capacity(images.len());
        let mut dropped = 0;

        for image in images {
            match self.resolve_one(store, mode, image)? {
                Some(r) => resolved.push(r),
                None => dropped += 1,
            }
        }

        let mut result = split_featured(resolved);
        result.dropped = dropped;
        Ok(result)
    }

    /// 单条解析; None 表示源不可读被跳过
    fn resolve_one<S>(
        &self,
        store: &S,
        mode: ImporterMode,
        image: &ImageRef,
    ) -> ImportResult<Option<ResolvedImage>>
    where
        S: MediaRepository + ?Sized,
    {
        let display_name = image.display_name();

        // a. 复用已有资产
        if let Some(asset) = store.find_asset_by_title(&display_name)? {
            debug!(
                display_name = %display_name,
                asset_id = asset.id,
                "复用已有媒体资产"
            );
            return Ok(Some(ResolvedImage::from_asset(image, &asset, true)));
        }

        // b. dry-run 透传
        if mode.is_dry_run() {
            return Ok(Some(ResolvedImage::unresolved(image)));
        }

        // c. 上传
        let source = Path::new(&image.path);
        if !source.is_file() {
            warn!(path = %image.path, "图片源文件不可读, 已跳过");
            return Ok(None);
        }

        let Some(asset) = self.upload(store, source, &display_name)? else {
            return Ok(None);
        };
        if mode.is_update() {
            let metadata = derive_metadata(Path::new(&asset.file_path), &asset);
            store.update_asset_metadata(asset.id, &metadata)?;
        }

        info!(
            display_name = %display_name,
            asset_id = asset.id,
            url = %asset.url,
            "图片上传完成"
        );
        Ok(Some(ResolvedImage::from_asset(image, &asset, false)))
    }

    /// 复制到 upload_dir/YYYY/MM/ 并创建资产记录
    ///
    /// # 返回
    /// - Ok(None): 源文件读取失败, 跳过该图片
    /// - Err(UploadError): 上传目录侧失败
    fn upload<S>(
        &self,
        store: &S,
        source: &Path,
        display_name: &str,
    ) -> ImportResult<Option<MediaAsset>>
    where
        S: MediaRepository + ?Sized,
    {
        // 先完整读入源文件, 读取失败不会在上传目录留下残缺文件
        let bytes = match fs::read(source) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %source.display(), error = %e, "图片源文件读取失败, 已跳过");
                return Ok(None);
            }
        };

        let now = Utc::now();
        let sub_dir = format!("{:04}/{:02}", now.year(), now.month());
        let target_dir = self.upload_dir.join(&sub_dir);

        let upload_err = |path: &Path, e: std::io::Error| ImportError::UploadError {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        fs::create_dir_all(&target_dir).map_err(|e| upload_err(&target_dir, e))?;

        let file_name = unique_file_name(&target_dir, display_name);
        let target = target_dir.join(&file_name);
        if let Err(e) = fs::write(&target, &bytes) {
            let _ = fs::remove_file(&target);
            return Err(upload_err(&target, e));
        }

        let new_asset = NewMediaAsset {
            title: display_name.to_string(),
            file_path: target.display().to_string(),
            url: format!("{}/{}/{}", self.base_url, sub_dir, file_name),
            mime_type: guess_mime(&target),
        };
        Ok(Some(store.insert_asset(&new_asset)?))
    }
}

/// 挑选特色图片, 其余按原顺序进入图集
///
/// 仅 featured_image 键或首个位置引用可成为特色图片; 其他命名键留在图集
fn split_featured(mut resolved: Vec<ResolvedImage>) -> ResolvedImages {
    let featured_index = resolved
        .iter()
        .position(|r| r.key.as_deref() == Some(FEATURED_IMAGE_KEY))
        .or_else(|| resolved.iter().position(|r| r.key.is_none()));

    let featured = featured_index.map(|i| resolved.remove(i));
    ResolvedImages {
        featured,
        gallery: resolved,
        dropped: 0,
    }
}

/// 目标目录内不冲突的文件名（name.jpg → name-1.jpg → name-2.jpg ...）
fn unique_file_name(dir: &Path, display_name: &str) -> String {
    if !dir.join(display_name).exists() {
        return display_name.to_string();
    }

    let path = Path::new(display_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| display_name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().to_string());

    let mut n = 1;
    loop {
        let candidate = match &ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        n += 1;
    }
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// 派生元数据; 解码失败时尺寸与缩略图留空
fn derive_metadata(path: &Path, asset: &MediaAsset) -> serde_json::Value {
    let filesize = fs::metadata(path).map(|m| m.len()).ok();

    let decoded = match image::open(path) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "图片解码失败, 跳过尺寸与缩略图");
            None
        }
    };

    let (width, height) = match &decoded {
        Some(img) => (Some(img.width()), Some(img.height())),
        None => (None, None),
    };

    let thumbnail = decoded.and_then(|img| {
        let thumb_path = thumbnail_path(path);
        let thumb = img.resize_to_fill(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);
        match thumb.save(&thumb_path) {
            Ok(()) => {
                let file = thumb_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let url = match asset.url.rsplit_once('/') {
                    Some((dir, _)) => format!("{}/{}", dir, file),
                    None => file.clone(),
                };
                Some(json!({
                    "file": file,
                    "width": THUMBNAIL_SIZE,
                    "height": THUMBNAIL_SIZE,
                    "url": url,
                }))
            }
            Err(e) => {
                warn!(path = %thumb_path.display(), error = %e, "缩略图生成失败");
                None
            }
        }
    });

    json!({
        "mime_type": asset.mime_type,
        "filesize": filesize,
        "width": width,
        "height": height,
        "sizes": { "thumbnail": thumbnail },
    })
}

/// a.jpg → a-150x150.jpg
fn thumbnail_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!(
            "{}-{}x{}.{}",
            stem,
            THUMBNAIL_SIZE,
            THUMBNAIL_SIZE,
            ext.to_string_lossy()
        ),
        None => format!("{}-{}x{}", stem, THUMBNAIL_SIZE, THUMBNAIL_SIZE),
    };
    path.with_file_name(name)
}
