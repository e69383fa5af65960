// ==========================================
// 排放计算引擎 - 行解码工具
// ==========================================
// 约定: 小数以 TEXT 存储；日期以 %Y-%m-%d 存储；枚举存 SCREAMING_SNAKE_CASE
// ==========================================

use crate::domain::types::{ActivityType, FlightRange, MatchMethod, Scope};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

/// 数据库日期格式
pub const DB_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_decimal(field: &str, raw: &str) -> RepositoryResult<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| RepositoryError::field_value(field, format!("{} ({})", raw, e)))
}

pub fn parse_date(field: &str, raw: &str) -> RepositoryResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DB_DATE_FORMAT)
        .map_err(|e| RepositoryError::field_value(field, format!("{} ({})", raw, e)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DB_DATE_FORMAT).to_string()
}

pub fn parse_activity_type(raw: &str) -> RepositoryResult<ActivityType> {
    ActivityType::parse(raw)
        .ok_or_else(|| RepositoryError::field_value("activity_type", raw.to_string()))
}

pub fn parse_flight_range(raw: &str) -> RepositoryResult<FlightRange> {
    FlightRange::parse(raw)
        .ok_or_else(|| RepositoryError::field_value("flight_range", raw.to_string()))
}

pub fn parse_method(raw: &str) -> RepositoryResult<MatchMethod> {
    MatchMethod::from_str(raw).ok_or_else(|| RepositoryError::field_value("method", raw.to_string()))
}

pub fn parse_scope(raw: i64) -> RepositoryResult<Scope> {
    Scope::from_i64(raw).ok_or_else(|| RepositoryError::field_value("scope", raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_name_the_field() {
        let err = parse_decimal("co2e_factor", "abc").unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::FieldValueError { ref field, .. } if field == "co2e_factor"
        ));
        assert!(parse_scope(1).is_err());
        assert_eq!(parse_activity_type("AIR_TRAVEL").unwrap(), ActivityType::AirTravel);
    }

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("d", &format_date(date)).unwrap(), date);
    }
}
