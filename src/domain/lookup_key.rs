// ==========================================
// 排放计算引擎 - 查找键规范化
// ==========================================
// 职责: 因子表构建与活动记录匹配共用同一套键规则
// 规则: 小写 + 去首尾空白；航空复合键按 ", " 连接
// ==========================================

use crate::domain::types::FlightRange;

/// 复合键分隔符（航程, 舱位）
pub const COMPOSITE_DELIMITER: &str = ", ";

/// 单列键规范化（小写 + 去首尾空白）
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// 航空复合键: "<航程>, <舱位>"
pub fn composite_key(flight_range: FlightRange, passenger_class: &str) -> String {
    format!(
        "{}{}{}",
        normalize_key(flight_range.label()),
        COMPOSITE_DELIMITER,
        normalize_key(passenger_class)
    )
}

/// 解析因子表中的复合标识（如 "Long-haul, Business class"）
///
/// 逐段去空白、小写后以统一分隔符重新拼接，
/// 保证与 `composite_key` 生成的键逐字节一致。
pub fn normalize_composite_identifier(raw: &str) -> String {
    raw.split(',')
        .map(normalize_key)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(COMPOSITE_DELIMITER)
}
