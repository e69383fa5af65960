// ==========================================
// 排放计算引擎 - 单位换算
// ==========================================
// 职责: 活动单位 ↔ 因子单位换算，纯函数、无状态
// 精度: 中间步骤不舍入，只在最终输出按 4 位小数四舍五入（half-up）
// ==========================================

use crate::engine::error::{CalculationError, CalculationResult};
use rust_decimal::prelude::*;

/// 英里 → 公里
pub const MILES_TO_KM: Decimal = Decimal::from_parts(160934, 0, 0, false, 5);

/// 千克 / 吨
pub const KG_PER_TONNE: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// 最终输出保留的小数位数
pub const OUTPUT_DECIMAL_PLACES: u32 = 4;

pub struct UnitConverter;

impl UnitConverter {
    /// 英里 → 公里
    ///
    /// 结果超出 Decimal 表示范围时返回 Validation，而不是 panic。
    pub fn miles_to_km(miles: Decimal) -> CalculationResult<Decimal> {
        miles.checked_mul(MILES_TO_KM).ok_or_else(|| {
            CalculationError::validation("distance_miles", format!("距离换算溢出: {}", miles))
        })
    }

    pub fn km_to_miles(km: Decimal) -> Decimal {
        km / MILES_TO_KM
    }

    pub fn kg_to_tonnes(kg: Decimal) -> Decimal {
        kg / KG_PER_TONNE
    }

    /// 解析数值文本
    ///
    /// 去除首尾空白、千分位逗号与引号后解析为 Decimal；
    /// 数字中间的空白视为格式错误，含非数字内容时返回 MalformedNumber。
    ///
    /// # 示例
    /// - "1,234.56" → 1234.56
    /// - "\"3,459\"" → 3459
    pub fn normalize_numeric(raw: &str) -> CalculationResult<Decimal> {
        let stripped: String = raw.trim().chars().filter(|c| *c != ',' && *c != '"').collect();
        let cleaned = stripped.trim();

        if cleaned.is_empty() {
            return Err(CalculationError::MalformedNumber(raw.to_string()));
        }

        Decimal::from_str(cleaned)
            .or_else(|_| Decimal::from_scientific(cleaned))
            .map_err(|_| CalculationError::MalformedNumber(raw.to_string()))
    }

    /// 最终输出舍入（4 位小数，half-up）
    pub fn round_output(value: Decimal) -> Decimal {
        value.round_dp_with_strategy(OUTPUT_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_miles_to_km() {
        assert_eq!(UnitConverter::miles_to_km(dec("100")).unwrap(), dec("160.934"));
        assert_eq!(UnitConverter::miles_to_km(dec("3459")).unwrap(), dec("5566.70706"));
    }

    #[test]
    fn test_miles_to_km_overflow_is_validation_error() {
        let result = UnitConverter::miles_to_km(Decimal::MAX);
        assert!(matches!(
            result,
            Err(CalculationError::Validation { ref field, .. }) if field == "distance_miles"
        ));
    }

    #[test]
    fn test_miles_km_round_trip() {
        for raw in ["0.01", "1", "3459", "12345.678", "987654.321"] {
            let x = dec(raw);
            let back = UnitConverter::km_to_miles(UnitConverter::miles_to_km(x).unwrap());
            assert!((back - x).abs() < dec("0.0001"), "round trip failed for {}", raw);
        }
    }

    #[test]
    fn test_kg_to_tonnes() {
        assert_eq!(UnitConverter::kg_to_tonnes(dec("261.6")), dec("0.2616"));
    }

    #[test]
    fn test_normalize_numeric_strips_separators() {
        assert_eq!(UnitConverter::normalize_numeric("1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(UnitConverter::normalize_numeric("\"3,459\"").unwrap(), dec("3459"));
        assert_eq!(UnitConverter::normalize_numeric(" 42 ").unwrap(), dec("42"));
    }

    #[test]
    fn test_normalize_numeric_rejects_garbage() {
        assert!(matches!(
            UnitConverter::normalize_numeric("12a4"),
            Err(CalculationError::MalformedNumber(_))
        ));
        assert!(matches!(
            UnitConverter::normalize_numeric(""),
            Err(CalculationError::MalformedNumber(_))
        ));
    }

    #[test]
    fn test_normalize_numeric_rejects_inner_whitespace() {
        assert!(matches!(
            UnitConverter::normalize_numeric("12 3.4"),
            Err(CalculationError::MalformedNumber(ref raw)) if raw == "12 3.4"
        ));
        assert!(matches!(
            UnitConverter::normalize_numeric("\" \""),
            Err(CalculationError::MalformedNumber(_))
        ));
    }

    #[test]
    fn test_round_output_half_up() {
        assert_eq!(UnitConverter::round_output(dec("0.26145")), dec("0.2615"));
        assert_eq!(UnitConverter::round_output(dec("0.26144999")), dec("0.2614"));
        assert_eq!(UnitConverter::round_output(dec("0.3")), dec("0.3"));
    }
}
