// ==========================================
// 分类信息导入系统 - 命令行参数
// ==========================================
// 优先级: 命令行 > 配置文件 (--config) > 默认值
// ==========================================

use crate::config::ImportConfigBuilder;
use crate::domain::types::ListingType;
use crate::importer::error::{ImportError, ImportResult};
use clap::Parser;
use std::path::PathBuf;

/// 从 CSV / JSON Lines / Excel 文件批量导入分类信息
#[derive(Parser, Debug)]
#[command(name = "listing-importer", version, about = "分类信息批量导入工具")]
pub struct CliArgs {
    /// 数据文件（.csv / .jsonl / .ndjson / .xlsx / .xls）
    pub file: PathBuf,

    /// 起始行（1 起, 闭区间; 0 为从头开始）
    #[arg(long)]
    pub start: Option<usize>,

    /// 结束行（闭区间; 省略时不限）
    #[arg(long)]
    pub end: Option<usize>,

    /// 导入模式: dry-run / update / skip（默认 update）
    #[arg(long)]
    pub mode: Option<String>,

    /// 前置回调: `标识符` 或 `文件路径,标识符`
    #[arg(long)]
    pub pre_create_callback: Option<String>,

    /// 后置回调: `标识符` 或 `文件路径,标识符`
    #[arg(long)]
    pub post_create_callback: Option<String>,

    /// 类型标签未映射时使用的默认列表类型
    #[arg(long)]
    pub default_listing_type: Option<String>,

    /// 映射到 generic 类型的外部标签
    #[arg(long, value_delimiter = ',')]
    pub generic_listing_types: Vec<String>,

    /// 映射到 event 类型的外部标签
    #[arg(long, value_delimiter = ',')]
    pub event_listing_types: Vec<String>,

    /// 映射到 marketplace 类型的外部标签
    #[arg(long, value_delimiter = ',')]
    pub marketplace_listing_types: Vec<String>,

    /// 映射到 place 类型的外部标签
    #[arg(long, value_delimiter = ',')]
    pub place_listing_types: Vec<String>,

    /// generic 类型覆盖模板
    #[arg(long)]
    pub generic_listing_template: Option<PathBuf>,

    /// event 类型覆盖模板
    #[arg(long)]
    pub event_listing_template: Option<PathBuf>,

    /// marketplace 类型覆盖模板
    #[arg(long)]
    pub marketplace_listing_template: Option<PathBuf>,

    /// place 类型覆盖模板
    #[arg(long)]
    pub place_listing_template: Option<PathBuf>,

    /// SQLite 内容库路径
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// 受管上传目录
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// 上传目录对应的公开路径前缀
    #[arg(long)]
    pub upload_base_url: Option<String>,

    /// JSON 配置文件（命令行参数覆盖其中的值）
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 首次落库失败即中止运行
    #[arg(long)]
    pub abort_on_error: bool,

    /// 以 JSON 行格式输出日志
    #[arg(long)]
    pub log_json: bool,
}

impl CliArgs {
    /// 组装配置构建器（配置文件 → 命令行覆盖）
    pub fn to_builder(&self) -> ImportResult<ImportConfigBuilder> {
        let mut builder = match &self.config {
            Some(path) => ImportConfigBuilder::from_json_file(path)?,
            None => ImportConfigBuilder::new(),
        };

        if let Some(mode) = &self.mode {
            builder.mode(mode)?;
        }
        if let Some(t) = &self.default_listing_type {
            let listing_type =
                t.parse::<ListingType>()
                    .map_err(|e| ImportError::InvalidConfig {
                        key: "default-listing-type".to_string(),
                        message: e.to_string(),
                    })?;
            builder.default_listing_type(listing_type);
        }

        for (listing_type, labels) in [
            (ListingType::Generic, &self.generic_listing_types),
            (ListingType::Event, &self.event_listing_types),
            (ListingType::Marketplace, &self.marketplace_listing_types),
            (ListingType::Place, &self.place_listing_types),
        ] {
            if !labels.is_empty() {
                builder.set_types(listing_type, labels);
            }
        }

        for (listing_type, template) in [
            (ListingType::Generic, &self.generic_listing_template),
            (ListingType::Event, &self.event_listing_template),
            (ListingType::Marketplace, &self.marketplace_listing_template),
            (ListingType::Place, &self.place_listing_template),
        ] {
            if let Some(path) = template {
                builder.template_override(listing_type, path.clone());
            }
        }

        if let Some(start) = self.start {
            builder.start(start);
        }
        if self.end.is_some() {
            builder.end(self.end);
        }
        if let Some(cb) = &self.pre_create_callback {
            builder.pre_create_callback(cb.clone());
        }
        if let Some(cb) = &self.post_create_callback {
            builder.post_create_callback(cb.clone());
        }
        if let Some(db) = &self.db {
            builder.db_path(db.clone());
        }
        if let Some(dir) = &self.upload_dir {
            builder.upload_dir(dir.clone());
        }
        if let Some(url) = &self.upload_base_url {
            builder.upload_base_url(url.clone());
        }
        if self.abort_on_error {
            builder.abort_on_persistence_error(true);
        }

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("listing-importer").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_per_type_options() {
        let args = parse(&[
            "rows.csv",
            "--mode",
            "dry-run",
            "--start",
            "2",
            "--end",
            "3",
            "--marketplace-listing-types",
            "market_raw,classifieds",
            "--place-listing-types",
            "venue",
            "--place-listing-types",
            "spot",
            "--default-listing-type",
            "event",
        ]);
        let config = args.to_builder().unwrap().build().unwrap();

        assert!(config.mode().is_dry_run());
        assert_eq!(config.start(), 2);
        assert_eq!(config.end(), Some(3));
        assert_eq!(config.default_listing_type(), ListingType::Event);
        let mapper = config.type_mapper();
        assert_eq!(mapper.get_listing_type("classifieds"), Ok(ListingType::Marketplace));
        assert_eq!(mapper.get_listing_type("venue"), Ok(ListingType::Place));
        assert_eq!(mapper.get_listing_type("spot"), Ok(ListingType::Place));
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let args = parse(&["rows.csv", "--mode", "merge"]);
        assert!(matches!(args.to_builder(), Err(ImportError::InvalidMode(_))));

        let args = parse(&["rows.csv", "--default-listing-type", "curated_list"]);
        assert!(matches!(
            args.to_builder(),
            Err(ImportError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_template_and_callback_options() {
        let args = parse(&[
            "rows.jsonl",
            "--place-listing-template",
            "/tmp/place.html",
            "--pre-create-callback",
            "hooks.php,trim-values",
            "--abort-on-error",
        ]);
        let config = args.to_builder().unwrap().build().unwrap();

        assert_eq!(
            config.template_overrides().get(&ListingType::Place),
            Some(&PathBuf::from("/tmp/place.html"))
        );
        assert_eq!(config.pre_create_callback(), Some("hooks.php,trim-values"));
        assert!(config.abort_on_persistence_error());
    }
}
