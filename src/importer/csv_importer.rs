// ==========================================
// 排放计算引擎 - CSV 导入器
// ==========================================
// 流程: 解析 → 列检查 → 逐行映射 → 批量写库（事务化）
// 规则: 坏行跳过并记录原因，不中止整个文件
// 文件: Emission_Factors.csv / Electricity.csv / Air_Travel.csv
//       / Purchased_Goods_and_Services.csv
// ==========================================

use crate::domain::types::ActivityType;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{activity_columns, factor_columns, FieldMapper};
use crate::importer::file_parser::{require_columns, CsvParser, RawRow};
use crate::repository::activity_repo::ActivityRepository;
use crate::repository::emission_factor_repo::EmissionFactorRepository;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const FACTORS_FILE: &str = "Emission_Factors.csv";
pub const ELECTRICITY_FILE: &str = "Electricity.csv";
pub const AIR_TRAVEL_FILE: &str = "Air_Travel.csv";
pub const GOODS_SERVICES_FILE: &str = "Purchased_Goods_and_Services.csv";

/// 被拒绝的行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    /// 文件行号（表头为第 1 行）
    pub row: usize,
    pub reason: String,
}

/// 单文件导入结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub rejected: Vec<RowRejection>,
}

/// 目录导入结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub factors: ImportSummary,
    pub electricity: ImportSummary,
    pub air_travel: ImportSummary,
    pub goods_services: ImportSummary,
}

// ==========================================
// CsvImporter - CSV 导入器
// ==========================================
pub struct CsvImporter {
    factor_repo: Arc<EmissionFactorRepository>,
    activity_repo: Arc<ActivityRepository>,
    parser: CsvParser,
    mapper: FieldMapper,
}

impl CsvImporter {
    pub fn new(
        factor_repo: Arc<EmissionFactorRepository>,
        activity_repo: Arc<ActivityRepository>,
    ) -> Self {
        Self {
            factor_repo,
            activity_repo,
            parser: CsvParser,
            mapper: FieldMapper::new(),
        }
    }

    /// 导入参考因子表
    pub fn import_factors(&self, file_path: &Path) -> ImportResult<ImportSummary> {
        let rows = self.parser.parse_to_raw_records(file_path)?;
        self.import_factor_rows(&rows)
    }

    /// 导入已解析的因子行
    pub fn import_factor_rows(&self, rows: &[RawRow]) -> ImportResult<ImportSummary> {
        use factor_columns::*;
        require_columns(rows, &[ACTIVITY, LOOKUP_IDENTIFIERS, UNIT, CO2E, SCOPE])?;

        let (factors, mut summary) =
            map_rows(rows, |row, row_number| self.mapper.map_factor(row, row_number))?;
        summary.imported = self.factor_repo.batch_insert(&factors)?;

        tracing::info!(
            total_rows = summary.total_rows,
            imported = summary.imported,
            rejected = summary.rejected.len(),
            "排放因子导入完成"
        );
        Ok(summary)
    }

    /// 导入某活动类型的数据文件
    pub fn import_activities(
        &self,
        activity_type: ActivityType,
        file_path: &Path,
    ) -> ImportResult<ImportSummary> {
        let rows = self.parser.parse_to_raw_records(file_path)?;
        self.import_activity_rows(activity_type, &rows)
    }

    /// 导入已解析的活动行
    pub fn import_activity_rows(
        &self,
        activity_type: ActivityType,
        rows: &[RawRow],
    ) -> ImportResult<ImportSummary> {
        use activity_columns::*;
        let required: &[&str] = match activity_type {
            ActivityType::Electricity => &[DATE, COUNTRY],
            ActivityType::AirTravel => &[DATE, FLIGHT_RANGE, PASSENGER_CLASS],
            ActivityType::GoodsServices => &[DATE, SPEND],
        };
        require_columns(rows, required)?;

        let (records, mut summary) = map_rows(rows, |row, row_number| {
            self.mapper.map_activity(activity_type, row, row_number)
        })?;
        summary.imported = self.activity_repo.batch_insert(&records)?;

        tracing::info!(
            activity_type = %activity_type,
            total_rows = summary.total_rows,
            imported = summary.imported,
            rejected = summary.rejected.len(),
            "活动数据导入完成"
        );
        Ok(summary)
    }

    /// 从目录导入全部标准文件（缺失的文件跳过并告警）
    pub fn seed_directory(&self, data_dir: &Path) -> ImportResult<SeedSummary> {
        let mut seed = SeedSummary::default();

        let factors_path = data_dir.join(FACTORS_FILE);
        if factors_path.exists() {
            seed.factors = self.import_factors(&factors_path)?;
        } else {
            tracing::warn!(path = %factors_path.display(), "因子文件不存在，跳过");
        }

        for (activity_type, file_name) in [
            (ActivityType::Electricity, ELECTRICITY_FILE),
            (ActivityType::AirTravel, AIR_TRAVEL_FILE),
            (ActivityType::GoodsServices, GOODS_SERVICES_FILE),
        ] {
            let path = data_dir.join(file_name);
            if !path.exists() {
                tracing::warn!(path = %path.display(), "活动文件不存在，跳过");
                continue;
            }
            let summary = self.import_activities(activity_type, &path)?;
            match activity_type {
                ActivityType::Electricity => seed.electricity = summary,
                ActivityType::AirTravel => seed.air_travel = summary,
                ActivityType::GoodsServices => seed.goods_services = summary,
            }
        }

        Ok(seed)
    }
}

/// 逐行映射，行级错误记入拒绝列表，其余错误上抛
fn map_rows<T, F>(rows: &[RawRow], mut map: F) -> ImportResult<(Vec<T>, ImportSummary)>
where
    F: FnMut(&RawRow, usize) -> ImportResult<T>,
{
    let mut mapped = Vec::with_capacity(rows.len());
    let mut summary = ImportSummary {
        total_rows: rows.len(),
        ..ImportSummary::default()
    };

    for (idx, row) in rows.iter().enumerate() {
        // 行号从表头后的第 2 行开始
        let row_number = idx + 2;
        match map(row, row_number) {
            Ok(item) => mapped.push(item),
            Err(e) if e.is_row_level() => {
                tracing::warn!(row = row_number, error = %e, "导入行被拒绝");
                summary.rejected.push(RowRejection {
                    row: row_number,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok((mapped, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rows_collects_rejections() {
        let rows: Vec<RawRow> = vec![RawRow::new(), RawRow::new(), RawRow::new()];
        let (mapped, summary) = map_rows(&rows, |_, row_number| {
            if row_number == 3 {
                Err(ImportError::MissingField {
                    row: row_number,
                    field: "Date".to_string(),
                })
            } else {
                Ok(row_number)
            }
        })
        .unwrap();

        assert_eq!(mapped, vec![2, 4]);
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.rejected[0].row, 3);
    }

    #[test]
    fn test_map_rows_propagates_file_level_errors() {
        let rows: Vec<RawRow> = vec![RawRow::new()];
        let result: ImportResult<(Vec<usize>, ImportSummary)> = map_rows(&rows, |_, _| {
            Err(ImportError::CsvParseError("broken".to_string()))
        });
        assert!(result.is_err());
    }
}
