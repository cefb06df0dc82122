// ==========================================
// 分类信息导入系统 - 行数据源
// ==========================================
// 支持: CSV (.csv) / JSON Lines (.jsonl/.ndjson) / Excel (.xlsx/.xls)
// 规则:
// - 逐行产出, CSV/JSONL 不整体载入内存
// - 行号 1 起（不含表头）, start/end 闭区间
// - 结构非法的行产出 MalformedRow, 由调用方跳过
// ==========================================

use crate::domain::row::RawRow;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 行迭代器
pub type RowIter = Box<dyn Iterator<Item = ImportResult<RawRow>>>;

// ==========================================
// 文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    JsonLines,
    Excel,
}

impl FileFormat {
    /// 根据扩展名判定（大小写不敏感）
    pub fn from_path(path: &Path) -> ImportResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "jsonl" | "ndjson" => Ok(FileFormat::JsonLines),
            "xlsx" | "xls" => Ok(FileFormat::Excel),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

// ==========================================
// RowSource - 有界行数据源
// ==========================================
#[derive(Debug, Clone)]
pub struct RowSource {
    path: PathBuf,
    format: FileFormat,
    start: usize,
    end: Option<usize>,
}

impl RowSource {
    /// 打开数据源（仅校验路径与格式, 不读取内容）
    pub fn open<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        let format = FileFormat::from_path(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            format,
            start: 1,
            end: None,
        })
    }

    /// 起始行（1 起, 闭区间; 0 视为从头开始）
    pub fn set_start(&mut self, start: usize) -> &mut Self {
        self.start = start.max(1);
        self
    }

    /// 结束行（1 起, 闭区间; None 为不限）
    pub fn set_end(&mut self, end: Option<usize>) -> &mut Self {
        self.end = end;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// 从 start 行开始产出行（每次调用重新打开文件, 可重复迭代）
    pub fn rows(&self) -> ImportResult<RowIter> {
        debug!(
            path = %self.path.display(),
            format = ?self.format,
            start = self.start,
            end = ?self.end,
            "打开行数据源"
        );

        let inner: RowIter = match self.format {
            FileFormat::Csv => Box::new(CsvRows::open(&self.path)?),
            FileFormat::JsonLines => Box::new(JsonLinesRows::open(&self.path)?),
            FileFormat::Excel => Box::new(ExcelRows::open(&self.path)?),
        };

        Ok(Box::new(BoundedRows {
            inner,
            start: self.start,
            end: self.end,
            done: false,
        }))
    }
}

// ==========================================
// 区间裁剪
// ==========================================
struct BoundedRows {
    inner: RowIter,
    start: usize,
    end: Option<usize>,
    done: bool,
}

impl Iterator for BoundedRows {
    type Item = ImportResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let item = match self.inner.next() {
                Some(item) => item,
                None => {
                    self.done = true;
                    return None;
                }
            };

            let row_number = match &item {
                Ok(row) => row.row_number(),
                Err(ImportError::MalformedRow { row, .. }) => *row,
                Err(_) => {
                    // 非行级错误（IO 等）: 产出后终止
                    self.done = true;
                    return Some(item);
                }
            };

            if row_number < self.start {
                continue;
            }
            if self.end.is_some_and(|end| row_number > end) {
                self.done = true;
                return None;
            }
            return Some(item);
        }
        None
    }
}

// ==========================================
// CSV 行读取
// ==========================================
struct CsvRows {
    reader: csv::Reader<File>,
    headers: Vec<String>,
    record: StringRecord,
    row_number: usize,
}

impl CsvRows {
    fn open(path: &Path) -> ImportResult<Self> {
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 列数不一致时由本层判定为 MalformedRow
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Self {
            reader,
            headers,
            record: StringRecord::new(),
            row_number: 0,
        })
    }
}

impl Iterator for CsvRows {
    type Item = ImportResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let read = self.reader.read_record(&mut self.record);
            self.row_number += 1;
            let row_number = self.row_number;

            match read {
                Ok(false) => return None,
                Err(e) => {
                    if e.is_io_error() {
                        return Some(Err(ImportError::CsvParseError(e.to_string())));
                    }
                    return Some(Err(ImportError::MalformedRow {
                        row: row_number,
                        message: e.to_string(),
                    }));
                }
                Ok(true) => {}
            }

            if self.record.len() != self.headers.len() {
                return Some(Err(ImportError::MalformedRow {
                    row: row_number,
                    message: format!(
                        "列数不一致: 表头 {} 列, 本行 {} 列",
                        self.headers.len(),
                        self.record.len()
                    ),
                }));
            }

            let row = RawRow::from_pairs(
                row_number,
                self.headers
                    .iter()
                    .zip(self.record.iter())
                    .map(|(h, v)| (h.clone(), v.trim().to_string())),
            );

            // 跳过完全空白的行（行号照常计数）
            if row.is_blank() {
                continue;
            }
            return Some(Ok(row));
        }
    }
}

// ==========================================
// JSON Lines 行读取
// ==========================================
// 每行一个 JSON 对象; 嵌套值（如 images）保留为 JSON 文本
struct JsonLinesRows {
    reader: BufReader<File>,
    buf: Vec<u8>,
    row_number: usize,
}

impl JsonLinesRows {
    fn open(path: &Path) -> ImportResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            buf: Vec::new(),
            row_number: 0,
        })
    }

    fn parse_line(row_number: usize, line: &str) -> ImportResult<RawRow> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| ImportError::MalformedRow {
                row: row_number,
                message: format!("JSON 解析失败: {}", e),
            })?;

        let object = match value {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(ImportError::MalformedRow {
                    row: row_number,
                    message: format!("期望 JSON 对象, 实际 {}", json_kind(&other)),
                })
            }
        };

        Ok(RawRow::from_pairs(
            row_number,
            object.into_iter().map(|(k, v)| {
                let text = match v {
                    serde_json::Value::String(s) => s.trim().to_string(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.trim().to_string(), text)
            }),
        ))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl Iterator for JsonLinesRows {
    type Item = ImportResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // 按字节读取, 非法 UTF-8 只影响本行
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(ImportError::FileReadError(e.to_string()))),
            }
            if self.buf.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            self.row_number += 1;
            let row_number = self.row_number;
            return Some(match std::str::from_utf8(&self.buf) {
                Ok(line) => Self::parse_line(row_number, line.trim()),
                Err(e) => Err(ImportError::MalformedRow {
                    row: row_number,
                    message: format!("非法 UTF-8: {}", e),
                }),
            });
        }
    }
}

// ==========================================
// Excel 行读取
// ==========================================
// calamine 以工作表为单位载入; 行仍逐行转换产出
struct ExcelRows {
    range: Range<Data>,
    headers: Vec<String>,
    next_index: usize, // range 内相对行索引（0 为表头）
}

impl ExcelRows {
    fn open(path: &Path) -> ImportResult<Self> {
        let mut workbook = open_workbook_auto(path)?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;
        if range.is_empty() {
            return Err(ImportError::ExcelParseError("Excel 文件无数据行".to_string()));
        }

        let width = range.width();
        let headers = (0..width)
            .map(|col| {
                range
                    .get((0, col))
                    .map(|cell| cell.to_string().trim().to_string())
                    .unwrap_or_default()
            })
            .collect();

        Ok(Self {
            range,
            headers,
            next_index: 1,
        })
    }
}

impl Iterator for ExcelRows {
    type Item = ImportResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_index < self.range.height() {
            let index = self.next_index;
            self.next_index += 1;

            let row = RawRow::from_pairs(
                index,
                self.headers.iter().enumerate().map(|(col, header)| {
                    let value = self
                        .range
                        .get((index, col))
                        .map(|cell| cell.to_string().trim().to_string())
                        .unwrap_or_default();
                    (header.clone(), value)
                }),
            );

            if row.is_blank() {
                continue;
            }
            return Some(Ok(row));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn temp_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn collect_ok(source: &RowSource) -> Vec<RawRow> {
        source
            .rows()
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_csv_rows_in_order() {
        let file = temp_file(
            ".csv",
            "wp_post.post_title,price\nA,1\nB,2\nC,3\n",
        );
        let source = RowSource::open(file.path()).unwrap();
        let rows = collect_ok(&source);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("wp_post.post_title"), Some("A"));
        assert_eq!(rows[2].get("price"), Some("3"));
        assert_eq!(rows[2].row_number(), 3);
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let file = temp_file(".csv", "t\nr1\nr2\nr3\nr4\nr5\n");
        let mut source = RowSource::open(file.path()).unwrap();
        source.set_start(2).set_end(Some(3));

        let titles: Vec<String> = collect_ok(&source)
            .iter()
            .map(|r| r.get("t").unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["r2", "r3"]);

        // 可重复迭代
        assert_eq!(collect_ok(&source).len(), 2);
    }

    #[test]
    fn test_start_zero_means_from_beginning() {
        let file = temp_file(".csv", "t\nr1\nr2\n");
        let mut source = RowSource::open(file.path()).unwrap();
        source.set_start(0);
        assert_eq!(collect_ok(&source).len(), 2);
    }

    #[test]
    fn test_csv_malformed_row_is_reported_and_iteration_continues() {
        let file = temp_file(".csv", "a,b\n1,2\n1,2,3\n4,5\n");
        let source = RowSource::open(file.path()).unwrap();
        let items: Vec<_> = source.rows().unwrap().collect();

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(matches!(
            items[1],
            Err(ImportError::MalformedRow { row: 2, .. })
        ));
        assert_eq!(items[2].as_ref().unwrap().get("a"), Some("4"));
    }

    #[test]
    fn test_csv_blank_rows_skipped_but_counted() {
        let file = temp_file(".csv", "a,b\n1,2\n,\n3,4\n");
        let source = RowSource::open(file.path()).unwrap();
        let rows = collect_ok(&source);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].row_number(), 3);
    }

    #[test]
    fn test_jsonl_rows_keep_nested_values_as_json() {
        let file = temp_file(
            ".jsonl",
            "{\"wp_post.post_title\":\"A\",\"images\":[{\"path\":\"a.jpg\"}],\"price\":100}\n\n[1,2]\n{\"wp_post.post_title\":\"B\"}\n",
        );
        let source = RowSource::open(file.path()).unwrap();
        let items: Vec<_> = source.rows().unwrap().collect();

        assert_eq!(items.len(), 3);
        let first = items[0].as_ref().unwrap();
        assert_eq!(first.get("price"), Some("100"));
        assert_eq!(first.get("images"), Some("[{\"path\":\"a.jpg\"}]"));
        assert!(matches!(
            items[1],
            Err(ImportError::MalformedRow { row: 2, .. })
        ));
        assert_eq!(items[2].as_ref().unwrap().row_number(), 3);
    }

    #[test]
    fn test_jsonl_invalid_utf8_line_is_malformed_and_iteration_continues() {
        let mut file = Builder::new().suffix(".jsonl").tempfile().unwrap();
        file.write_all(b"{\"wp_post.post_title\":\"A\"}\n").unwrap();
        file.write_all(b"{\"wp_post.post_title\":\"B\xff\"}\r\n").unwrap();
        file.write_all(b"{\"wp_post.post_title\":\"C\"}").unwrap();

        let source = RowSource::open(file.path()).unwrap();
        let items: Vec<_> = source.rows().unwrap().collect();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().title(), Some("A"));
        assert!(matches!(
            items[1],
            Err(ImportError::MalformedRow { row: 2, .. })
        ));
        let last = items[2].as_ref().unwrap();
        assert_eq!(last.title(), Some("C"));
        assert_eq!(last.row_number(), 3);
    }

    fn xlsx_fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("listings.xlsx")
    }

    #[test]
    fn test_excel_rows_trimmed_headers_and_row_numbers() {
        let source = RowSource::open(xlsx_fixture()).unwrap();
        assert_eq!(source.format(), FileFormat::Excel);

        let rows = collect_ok(&source);
        // 第 2 行为空行: 跳过但占用行号
        let numbered: Vec<(usize, &str)> = rows
            .iter()
            .map(|r| (r.row_number(), r.get("wp_post.post_title").unwrap()))
            .collect();
        assert_eq!(numbered, vec![(1, "Alpha"), (3, "Gamma"), (4, "Delta")]);
        assert_eq!(rows[0].get("price"), Some("10"));
        assert_eq!(rows[0].get("wp_post.post_date"), Some("1700000000"));
        assert_eq!(rows[1].get("wp_post.post_date"), Some(""));
    }

    #[test]
    fn test_excel_range_bounds() {
        let mut source = RowSource::open(xlsx_fixture()).unwrap();
        source.set_start(2).set_end(Some(3));

        let titles: Vec<String> = collect_ok(&source)
            .iter()
            .map(|r| r.get("wp_post.post_title").unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Gamma"]);
    }

    #[test]
    fn test_file_not_found_and_unsupported_format() {
        assert!(matches!(
            RowSource::open("/definitely/not/here.csv"),
            Err(ImportError::FileNotFound(_))
        ));

        let file = temp_file(".txt", "a\n1\n");
        assert!(matches!(
            RowSource::open(file.path()),
            Err(ImportError::UnsupportedFormat(ref ext)) if ext == "txt"
        ));
    }
}
