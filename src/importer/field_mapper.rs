// ==========================================
// 排放计算引擎 - 字段映射器
// ==========================================
// 职责: CSV 列 → 领域实体 + 类型转换
// 列名: 大小写不敏感，支持别名
// ==========================================

use crate::domain::activity::{
    ActivityPayload, ActivityRecord, AirTravelActivity, ElectricityActivity,
    GoodsServicesActivity,
};
use crate::domain::emission_factor::EmissionFactor;
use crate::domain::types::{ActivityType, FlightRange, Scope};
use crate::engine::normalizer::ActivityNormalizer;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use uuid::Uuid;

/// 因子表列
pub mod factor_columns {
    pub const ACTIVITY: &str = "Activity";
    pub const LOOKUP_IDENTIFIERS: &str = "Lookup identifiers";
    pub const UNIT: &str = "Unit";
    pub const CO2E: &str = "CO2e";
    pub const SCOPE: &str = "Scope";
    pub const CATEGORY: &str = "Category";
}

/// 活动表列
pub mod activity_columns {
    pub const DATE: &str = "Date";
    pub const COUNTRY: &str = "Country";
    pub const ELECTRICITY_USAGE: &str = "Electricity Usage";
    pub const DISTANCE_TRAVELLED: &str = "Distance travelled";
    pub const FLIGHT_RANGE: &str = "Flight range";
    pub const PASSENGER_CLASS: &str = "Passenger class";
    pub const SUPPLIER_CATEGORY: &str = "Supplier category";
    pub const SPEND: &str = "Spend";
    pub const DESCRIPTION: &str = "Description";
}

pub struct FieldMapper {
    cleaner: DataCleaner,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldMapper {
    pub fn new() -> Self {
        Self {
            cleaner: DataCleaner,
        }
    }

    // ==========================================
    // 排放因子
    // ==========================================

    /// 映射一行参考因子
    ///
    /// factor_id 由活动类型 + 查找键派生，重复导入同一因子表时覆盖而非新增。
    pub fn map_factor(&self, row: &RawRow, row_number: usize) -> ImportResult<EmissionFactor> {
        use factor_columns::*;

        let label = self.require(row, ACTIVITY, row_number)?;
        let activity_type = ActivityNormalizer::resolve_activity_type(&label).map_err(|_| {
            ImportError::UnrecognizedActivityType {
                row: row_number,
                value: label.clone(),
            }
        })?;

        let identifier = self.require(row, LOOKUP_IDENTIFIERS, row_number)?;
        let unit = self.require(row, UNIT, row_number)?;
        let co2e_raw = self.require(row, CO2E, row_number)?;
        let co2e_factor = self.cleaner.parse_amount(&co2e_raw, CO2E, row_number)?;
        let scope = self.parse_scope(&self.require(row, SCOPE, row_number)?, row_number)?;
        let category = self.parse_category(row, row_number)?;

        let mut factor = EmissionFactor::new(
            String::new(),
            activity_type,
            identifier,
            unit,
            co2e_factor,
            scope,
            category,
        );
        factor.factor_id = format!("{}:{}", activity_type.as_str(), factor.lookup_key);
        Ok(factor)
    }

    fn parse_scope(&self, raw: &str, row_number: usize) -> ImportResult<Scope> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        digits
            .parse::<i64>()
            .ok()
            .and_then(Scope::from_i64)
            .ok_or_else(|| ImportError::TypeConversionError {
                row: row_number,
                field: factor_columns::SCOPE.to_string(),
                message: format!("无法识别的排放范围: {}", raw),
            })
    }

    /// 分类可为空；非空但不是整数时拒绝整行
    fn parse_category(&self, row: &RawRow, row_number: usize) -> ImportResult<Option<i64>> {
        let Some(raw) = self.get_string(row, factor_columns::CATEGORY) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ImportError::TypeConversionError {
                row: row_number,
                field: factor_columns::CATEGORY.to_string(),
                message: format!("无法识别的分类: {}", raw),
            })
    }

    // ==========================================
    // 活动数据
    // ==========================================

    /// 按活动类型映射一行活动（id 新生成）
    pub fn map_activity(
        &self,
        activity_type: ActivityType,
        row: &RawRow,
        row_number: usize,
    ) -> ImportResult<ActivityRecord> {
        use activity_columns::*;

        let date = self
            .cleaner
            .validate_date(&self.require(row, DATE, row_number)?, DATE, row_number)?;

        let payload = match activity_type {
            ActivityType::Electricity => {
                let usage = self.require(row, ELECTRICITY_USAGE, row_number)?;
                ActivityPayload::Electricity(ElectricityActivity {
                    country: self.require(row, COUNTRY, row_number)?,
                    usage_kwh: self.cleaner.parse_amount(&usage, ELECTRICITY_USAGE, row_number)?,
                })
            }
            ActivityType::AirTravel => {
                let distance = self.require(row, DISTANCE_TRAVELLED, row_number)?;
                // 只校验可解析，保留原文由计算阶段换算
                self.cleaner
                    .parse_amount(&distance, DISTANCE_TRAVELLED, row_number)?;
                let range_raw = self.require(row, FLIGHT_RANGE, row_number)?;
                let flight_range = FlightRange::parse(&range_raw).ok_or_else(|| {
                    ImportError::TypeConversionError {
                        row: row_number,
                        field: FLIGHT_RANGE.to_string(),
                        message: format!("无法识别的航程: {}", range_raw),
                    }
                })?;
                ActivityPayload::AirTravel(AirTravelActivity {
                    distance_miles: distance,
                    flight_range,
                    passenger_class: self.require(row, PASSENGER_CLASS, row_number)?,
                })
            }
            ActivityType::GoodsServices => {
                let supplier_category = self.get_string(row, SUPPLIER_CATEGORY);
                let description = self
                    .get_string(row, DESCRIPTION)
                    .or_else(|| supplier_category.clone())
                    .ok_or_else(|| ImportError::MissingField {
                        row: row_number,
                        field: SUPPLIER_CATEGORY.to_string(),
                    })?;
                let spend = self.require(row, SPEND, row_number)?;
                ActivityPayload::GoodsServices(GoodsServicesActivity {
                    description,
                    supplier_category,
                    spend_gbp: self.cleaner.parse_amount(&spend, SPEND, row_number)?,
                })
            }
        };

        Ok(ActivityRecord::new(Uuid::new_v4().to_string(), date, payload))
    }

    // ==========================================
    // 列读取
    // ==========================================

    /// 读取列值（列名大小写不敏感，空白视为缺失）
    fn get_string(&self, row: &RawRow, key: &str) -> Option<String> {
        let aliases: &[&str] = match key {
            activity_columns::ELECTRICITY_USAGE => &["Electricity Usage", "Usage (kWh)", "kWh"],
            activity_columns::DISTANCE_TRAVELLED => &["Distance travelled", "Distance (miles)"],
            factor_columns::LOOKUP_IDENTIFIERS => &["Lookup identifiers", "Lookup identifier"],
            _ => &[],
        };

        let candidates = std::iter::once(key).chain(aliases.iter().copied());
        for alias in candidates {
            let value = row
                .iter()
                .find(|(header, _)| header.eq_ignore_ascii_case(alias))
                .and_then(|(_, v)| self.cleaner.normalize_null(Some(v)));
            if value.is_some() {
                return value;
            }
        }
        None
    }

    fn require(&self, row: &RawRow, key: &str, row_number: usize) -> ImportResult<String> {
        self.get_string(row, key).ok_or_else(|| ImportError::MissingField {
            row: row_number,
            field: key.to_string(),
        })
    }
}
