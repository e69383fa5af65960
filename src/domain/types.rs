// ==========================================
// 排放计算引擎 - 领域类型定义
// ==========================================
// 职责: 活动类型 / 航程 / 匹配方式 / 排放范围
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 活动类型 (Activity Type)
// ==========================================
// 顺序即处理顺序: Electricity → AirTravel → GoodsServices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Electricity,   // 外购电力 (Scope 2)
    AirTravel,     // 商务航空差旅 (Scope 3 / Category 6)
    GoodsServices, // 外购商品与服务 (Scope 3 / Category 1)
}

impl ActivityType {
    /// 全部活动类型（按处理顺序）
    pub const ALL: [ActivityType; 3] = [
        ActivityType::Electricity,
        ActivityType::AirTravel,
        ActivityType::GoodsServices,
    ];

    /// 数据库存储值
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Electricity => "ELECTRICITY",
            ActivityType::AirTravel => "AIR_TRAVEL",
            ActivityType::GoodsServices => "GOODS_SERVICES",
        }
    }

    /// 参考因子表中的展示标签
    pub fn label(&self) -> &'static str {
        match self {
            ActivityType::Electricity => "Electricity",
            ActivityType::AirTravel => "Air Travel",
            ActivityType::GoodsServices => "Purchased Goods and Services",
        }
    }

    /// 解析活动类型标签
    ///
    /// 同时接受展示标签（"Air Travel"）与存储值（"AIR_TRAVEL"），大小写不敏感。
    /// 无法识别时返回 None，由调用方映射为 UnrecognizedActivityType。
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "electricity" => Some(ActivityType::Electricity),
            "air travel" | "air_travel" | "airtravel" => Some(ActivityType::AirTravel),
            "purchased goods and services" | "goods_services" | "goods and services"
            | "goodsservices" => Some(ActivityType::GoodsServices),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 航程 (Flight Range)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightRange {
    ShortHaul,     // 短途
    LongHaul,      // 长途
    International, // 国际
}

impl FlightRange {
    /// 展示标签（与因子表复合键的第一段一致）
    pub fn label(&self) -> &'static str {
        match self {
            FlightRange::ShortHaul => "Short-haul",
            FlightRange::LongHaul => "Long-haul",
            FlightRange::International => "International",
        }
    }

    /// 解析航程（容忍大小写、空格与下划线差异）
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '_' { '-' } else { c })
            .collect();
        match normalized.as_str() {
            "short-haul" | "shorthaul" => Some(FlightRange::ShortHaul),
            "long-haul" | "longhaul" => Some(FlightRange::LongHaul),
            "international" => Some(FlightRange::International),
            _ => None,
        }
    }
}

impl fmt::Display for FlightRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ==========================================
// 匹配方式 (Match Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchMethod {
    Exact,     // 精确匹配（置信度恒为 1.0）
    Fuzzy,     // 模糊匹配（置信度 = 相似度 / 100）
    Unmatched, // 未匹配
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "EXACT",
            MatchMethod::Fuzzy => "FUZZY",
            MatchMethod::Unmatched => "UNMATCHED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "EXACT" => Some(MatchMethod::Exact),
            "FUZZY" => Some(MatchMethod::Fuzzy),
            "UNMATCHED" => Some(MatchMethod::Unmatched),
            _ => None,
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// GHG Protocol 排放范围 (Scope)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    Scope2, // 外购能源间接排放
    Scope3, // 价值链其他间接排放
}

impl Scope {
    pub fn as_i64(&self) -> i64 {
        match self {
            Scope::Scope2 => 2,
            Scope::Scope3 => 3,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            2 => Some(Scope::Scope2),
            3 => Some(Scope::Scope3),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SCOPE_{}", self.as_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_parse_labels() {
        assert_eq!(ActivityType::parse("Electricity"), Some(ActivityType::Electricity));
        assert_eq!(ActivityType::parse(" air travel "), Some(ActivityType::AirTravel));
        assert_eq!(
            ActivityType::parse("Purchased Goods and Services"),
            Some(ActivityType::GoodsServices)
        );
        assert_eq!(ActivityType::parse("GOODS_SERVICES"), Some(ActivityType::GoodsServices));
        assert_eq!(ActivityType::parse("Rail"), None);
    }

    #[test]
    fn test_flight_range_parse() {
        assert_eq!(FlightRange::parse("Long-haul"), Some(FlightRange::LongHaul));
        assert_eq!(FlightRange::parse("short haul"), Some(FlightRange::ShortHaul));
        assert_eq!(FlightRange::parse("INTERNATIONAL"), Some(FlightRange::International));
        assert_eq!(FlightRange::parse("medium"), None);
    }

    #[test]
    fn test_scope_round_trip() {
        assert_eq!(Scope::from_i64(2), Some(Scope::Scope2));
        assert_eq!(Scope::from_i64(1), None);
        assert_eq!(Scope::Scope3.as_i64(), 3);
    }
}
