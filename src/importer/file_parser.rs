// ==========================================
// 排放计算引擎 - CSV 文件解析器
// ==========================================
// 输出: 每行一个 表头 → 值 的映射（值已 trim）
// 规则: 跳过完全空白的行；表头去除 UTF-8 BOM
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 原始行（表头 → 单元格文本）
pub type RawRow = HashMap<String, String>;

pub struct CsvParser;

impl CsvParser {
    /// 解析 CSV 文件
    pub fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(file_path)?;
        self.parse_reader(file)
    }

    /// 从任意输入流解析
    pub fn parse_reader<R: Read>(&self, input: R) -> ImportResult<Vec<RawRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            records.push(row_map);
        }

        Ok(records)
    }
}

/// 检查必需列是否齐全（大小写不敏感）
pub fn require_columns(rows: &[RawRow], columns: &[&str]) -> ImportResult<()> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    for column in columns {
        if !first.keys().any(|k| k.eq_ignore_ascii_case(column)) {
            return Err(ImportError::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}
