// ==========================================
// 排放计算引擎 - 活动数据规范化
// ==========================================
// 职责: 按活动类型抽取 (查找键, 活动量, 活动单位)
//   - 电力:   key = country           amount = usage_kwh                 unit = kWh
//   - 航空:   key = "<航程>, <舱位>"    amount = miles_to_km(distance)     unit = kilometres
//   - 商品服务: key = description       amount = spend_gbp                 unit = GBP
// 校验: 日期可解析、活动量为正、键非空
// ==========================================

use crate::domain::activity::{ActivityPayload, ActivityRecord};
use crate::domain::lookup_key::{composite_key, normalize_key};
use crate::domain::types::ActivityType;
use crate::engine::error::{CalculationError, CalculationResult};
use crate::engine::unit_converter::UnitConverter;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub const UNIT_KWH: &str = "kWh";
pub const UNIT_KILOMETRES: &str = "kilometres";
pub const UNIT_GBP: &str = "GBP";

/// 支持的日期格式（日/月/年优先）
const DATE_FORMATS: [&str; 3] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"];

/// 规范化结果
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedActivity {
    pub activity_type: ActivityType,
    pub lookup_key: String,
    /// 换算到因子单位后的活动量（未舍入）
    pub amount: Decimal,
    pub unit: &'static str,
    pub activity_date: NaiveDate,
}

pub struct ActivityNormalizer;

impl ActivityNormalizer {
    /// 规范化单条活动记录
    pub fn normalize(record: &ActivityRecord) -> CalculationResult<NormalizedActivity> {
        let activity_date = Self::parse_activity_date(&record.date)?;

        let (lookup_key, amount, unit) = match &record.payload {
            ActivityPayload::Electricity(e) => {
                let key = Self::require_key("country", &e.country)?;
                let amount = Self::require_positive("usage_kwh", e.usage_kwh)?;
                (key, amount, UNIT_KWH)
            }
            ActivityPayload::AirTravel(a) => {
                if a.passenger_class.trim().is_empty() {
                    return Err(CalculationError::validation("passenger_class", "舱位为空"));
                }
                let key = composite_key(a.flight_range, &a.passenger_class);
                let miles = UnitConverter::normalize_numeric(&a.distance_miles)?;
                let miles = Self::require_positive("distance_miles", miles)?;
                (key, UnitConverter::miles_to_km(miles)?, UNIT_KILOMETRES)
            }
            ActivityPayload::GoodsServices(g) => {
                let key = Self::require_key("description", &g.description)?;
                let amount = Self::require_positive("spend_gbp", g.spend_gbp)?;
                (key, amount, UNIT_GBP)
            }
        };

        Ok(NormalizedActivity {
            activity_type: record.activity_type(),
            lookup_key,
            amount,
            unit,
            activity_date,
        })
    }

    /// 解析活动类型标签（"Electricity" / "Air Travel" / ...）
    pub fn resolve_activity_type(tag: &str) -> CalculationResult<ActivityType> {
        ActivityType::parse(tag)
            .ok_or_else(|| CalculationError::UnrecognizedActivityType(tag.to_string()))
    }

    /// 解析活动日期（dd/mm/yyyy，兼容 yyyy-mm-dd）
    pub fn parse_activity_date(raw: &str) -> CalculationResult<NaiveDate> {
        let trimmed = raw.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
            .ok_or_else(|| {
                CalculationError::validation("date", format!("无法解析的日期: '{}'", raw))
            })
    }

    fn require_key(field: &str, raw: &str) -> CalculationResult<String> {
        let key = normalize_key(raw);
        if key.is_empty() {
            return Err(CalculationError::validation(field, "查找字段为空"));
        }
        Ok(key)
    }

    fn require_positive(field: &str, value: Decimal) -> CalculationResult<Decimal> {
        if value <= Decimal::ZERO {
            return Err(CalculationError::validation(
                field,
                format!("活动量必须为正数，实际 {}", value),
            ));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::{AirTravelActivity, ElectricityActivity, GoodsServicesActivity};
    use crate::domain::types::FlightRange;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_electricity_key_and_unit() {
        let record = ActivityRecord::new(
            "A1",
            "15/03/2024",
            ActivityPayload::Electricity(ElectricityActivity {
                country: " United Kingdom ".to_string(),
                usage_kwh: dec("1000"),
            }),
        );
        let n = ActivityNormalizer::normalize(&record).unwrap();
        assert_eq!(n.lookup_key, "united kingdom");
        assert_eq!(n.amount, dec("1000"));
        assert_eq!(n.unit, UNIT_KWH);
        assert_eq!(n.activity_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn test_air_travel_composite_key_and_conversion() {
        let record = ActivityRecord::new(
            "A2",
            "2024-03-15",
            ActivityPayload::AirTravel(AirTravelActivity {
                distance_miles: "3,459".to_string(),
                flight_range: FlightRange::LongHaul,
                passenger_class: "Business Class".to_string(),
            }),
        );
        let n = ActivityNormalizer::normalize(&record).unwrap();
        assert_eq!(n.lookup_key, "long-haul, business class");
        assert_eq!(n.amount, dec("5566.70706"));
        assert_eq!(n.unit, UNIT_KILOMETRES);
    }

    #[test]
    fn test_goods_services_uses_description() {
        let record = ActivityRecord::new(
            "A3",
            "01/01/2024",
            ActivityPayload::GoodsServices(GoodsServicesActivity {
                description: "Paper Products".to_string(),
                supplier_category: Some("Stationery".to_string()),
                spend_gbp: dec("250.50"),
            }),
        );
        let n = ActivityNormalizer::normalize(&record).unwrap();
        assert_eq!(n.lookup_key, "paper products");
        assert_eq!(n.unit, UNIT_GBP);
    }

    #[test]
    fn test_malformed_distance() {
        let record = ActivityRecord::new(
            "A4",
            "01/01/2024",
            ActivityPayload::AirTravel(AirTravelActivity {
                distance_miles: "far".to_string(),
                flight_range: FlightRange::ShortHaul,
                passenger_class: "Economy".to_string(),
            }),
        );
        assert!(matches!(
            ActivityNormalizer::normalize(&record),
            Err(CalculationError::MalformedNumber(_))
        ));
    }

    #[test]
    fn test_bad_date_and_non_positive_amount() {
        let bad_date = ActivityRecord::new(
            "A5",
            "31/31/2024",
            ActivityPayload::Electricity(ElectricityActivity {
                country: "France".to_string(),
                usage_kwh: dec("10"),
            }),
        );
        assert!(matches!(
            ActivityNormalizer::normalize(&bad_date),
            Err(CalculationError::Validation { .. })
        ));

        let zero = ActivityRecord::new(
            "A6",
            "01/01/2024",
            ActivityPayload::Electricity(ElectricityActivity {
                country: "France".to_string(),
                usage_kwh: Decimal::ZERO,
            }),
        );
        assert!(matches!(
            ActivityNormalizer::normalize(&zero),
            Err(CalculationError::Validation { .. })
        ));
    }

    #[test]
    fn test_resolve_activity_type() {
        assert_eq!(
            ActivityNormalizer::resolve_activity_type("Air Travel").unwrap(),
            ActivityType::AirTravel
        );
        assert!(matches!(
            ActivityNormalizer::resolve_activity_type("Rail"),
            Err(CalculationError::UnrecognizedActivityType(_))
        ));
    }
}
