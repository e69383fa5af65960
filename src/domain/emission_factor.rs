// ==========================================
// 排放计算引擎 - 排放因子实体
// ==========================================
// 约束: 同一活动类型内，启用因子的 lookup_key 唯一
// 约束: 单次计算运行期间只读
// ==========================================

use crate::domain::lookup_key::{normalize_composite_identifier, normalize_key};
use crate::domain::types::{ActivityType, Scope};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// EmissionFactor - 排放因子
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactor {
    pub factor_id: String,
    pub activity_type: ActivityType,
    /// 原始标识（如 "Long-haul, Business class"）
    pub lookup_identifier: String,
    /// 规范化查找键（小写、去空白；航空为复合键）
    pub lookup_key: String,
    /// 因子单位（kWh / kilometres / GBP）
    pub unit: String,
    /// kgCO2e / 单位
    pub co2e_factor: Decimal,
    pub scope: Scope,
    /// Scope 3 分类号
    pub category: Option<i64>,
    /// 因子来源（如 "DEFRA 2024"）
    pub source: Option<String>,
    pub active: bool,
}

impl EmissionFactor {
    /// 创建启用状态的排放因子，并按活动类型规范化查找键
    pub fn new(
        factor_id: impl Into<String>,
        activity_type: ActivityType,
        lookup_identifier: impl Into<String>,
        unit: impl Into<String>,
        co2e_factor: Decimal,
        scope: Scope,
        category: Option<i64>,
    ) -> Self {
        let lookup_identifier = lookup_identifier.into();
        let lookup_key = Self::derive_lookup_key(activity_type, &lookup_identifier);
        Self {
            factor_id: factor_id.into(),
            activity_type,
            lookup_identifier,
            lookup_key,
            unit: unit.into(),
            co2e_factor,
            scope,
            category,
            source: None,
            active: true,
        }
    }

    /// 由原始标识派生查找键
    pub fn derive_lookup_key(activity_type: ActivityType, lookup_identifier: &str) -> String {
        match activity_type {
            ActivityType::AirTravel => normalize_composite_identifier(lookup_identifier),
            ActivityType::Electricity | ActivityType::GoodsServices => {
                normalize_key(lookup_identifier)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_air_travel_factor_key_is_composite() {
        let factor = EmissionFactor::new(
            "F1",
            ActivityType::AirTravel,
            "Long-haul, Business class",
            "kilometres",
            dec("0.04696"),
            Scope::Scope3,
            Some(6),
        );
        assert_eq!(factor.lookup_key, "long-haul, business class");
        assert!(factor.active);
    }

    #[test]
    fn test_electricity_factor_key_is_lowercased() {
        let factor = EmissionFactor::new(
            "F2",
            ActivityType::Electricity,
            " United Kingdom ",
            "kWh",
            dec("0.20705"),
            Scope::Scope2,
            None,
        );
        assert_eq!(factor.lookup_key, "united kingdom");
    }
}
