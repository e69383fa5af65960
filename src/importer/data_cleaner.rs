// ==========================================
// 排放计算引擎 - 数据清洗器
// ==========================================
// 职责: TRIM / NULL 标准化 / 货币与千分位清洗 / 日期校验
// 说明: 数值与日期的最终解析规则与计算阶段一致
// ==========================================

use crate::engine::normalizer::ActivityNormalizer;
use crate::engine::unit_converter::UnitConverter;
use crate::importer::error::{ImportError, ImportResult};
use rust_decimal::Decimal;

/// 需要剥离的货币前缀（含 UTF-8 被误读为 Latin-1 后的 "Â£"）
const CURRENCY_MARKERS: [&str; 3] = ["Â£", "£", "GBP"];

pub struct DataCleaner;

impl DataCleaner {
    pub fn clean_text(&self, value: &str) -> String {
        value.trim().to_string()
    }

    /// 空白视为缺失
    pub fn normalize_null(&self, value: Option<&str>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// 去除货币符号，保留数字文本
    pub fn strip_currency(&self, value: &str) -> String {
        let mut cleaned = value.trim().to_string();
        for marker in CURRENCY_MARKERS {
            cleaned = cleaned.replace(marker, "");
        }
        cleaned.trim().to_string()
    }

    /// 解析数量字段（容忍千分位、引号、货币符号）
    pub fn parse_amount(&self, value: &str, field: &str, row: usize) -> ImportResult<Decimal> {
        UnitConverter::normalize_numeric(&self.strip_currency(value)).map_err(|_| {
            ImportError::TypeConversionError {
                row,
                field: field.to_string(),
                message: format!("无法解析为数值: {}", value),
            }
        })
    }

    /// 校验日期文本并返回 trim 后的原文
    pub fn validate_date(&self, value: &str, field: &str, row: usize) -> ImportResult<String> {
        let trimmed = value.trim();
        ActivityNormalizer::parse_activity_date(trimmed).map_err(|_| {
            ImportError::DateFormatError {
                row,
                field: field.to_string(),
                value: value.to_string(),
            }
        })?;
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_null() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_null(Some("  ")), None);
        assert_eq!(cleaner.normalize_null(None), None);
        assert_eq!(cleaner.normalize_null(Some(" value ")), Some("value".to_string()));
    }

    #[test]
    fn test_parse_amount_strips_currency_and_separators() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.parse_amount("£1,250.50", "Spend", 2).unwrap(),
            Decimal::new(125050, 2)
        );
        assert_eq!(
            cleaner.parse_amount("Â£3,000", "Spend", 2).unwrap(),
            Decimal::from(3000)
        );
        assert_eq!(
            cleaner.parse_amount("\"3,459\"", "Distance travelled", 2).unwrap(),
            Decimal::from(3459)
        );
        assert!(matches!(
            cleaner.parse_amount("n/a", "Spend", 7),
            Err(ImportError::TypeConversionError { row: 7, .. })
        ));
    }

    #[test]
    fn test_validate_date() {
        let cleaner = DataCleaner;
        assert_eq!(
            cleaner.validate_date(" 15/03/2024 ", "Date", 2).unwrap(),
            "15/03/2024"
        );
        assert!(cleaner.validate_date("2024-03-15", "Date", 2).is_ok());
        assert!(matches!(
            cleaner.validate_date("31/02/2024", "Date", 3),
            Err(ImportError::DateFormatError { row: 3, .. })
        ));
    }
}
