// ==========================================
// 排放计算引擎 - 预聚合排放汇总
// ==========================================
// 维度: 时间窗口 × (范围 / 分类 / 活动类型) 组合
// 唯一: (from_date, to_date, scope, category, activity_type, summary_type)
// ==========================================

use crate::domain::types::{ActivityType, Scope};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 汇总粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SummaryType {
    Daily,
    Monthly,
}

impl SummaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::Daily => "DAILY",
            SummaryType::Monthly => "MONTHLY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DAILY" => Some(SummaryType::Daily),
            "MONTHLY" => Some(SummaryType::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for SummaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 聚合过滤条件（None 表示不限）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryFilter {
    pub scope: Option<Scope>,
    pub category: Option<i64>,
    pub activity_type: Option<ActivityType>,
}

impl SummaryFilter {
    pub fn overall() -> Self {
        Self::default()
    }

    pub fn scope(scope: Scope) -> Self {
        Self {
            scope: Some(scope),
            ..Self::default()
        }
    }

    pub fn scope_category(scope: Scope, category: i64) -> Self {
        Self {
            scope: Some(scope),
            category: Some(category),
            activity_type: None,
        }
    }

    pub fn activity_type(activity_type: ActivityType) -> Self {
        Self {
            activity_type: Some(activity_type),
            ..Self::default()
        }
    }

    pub fn scope_activity(scope: Scope, activity_type: ActivityType) -> Self {
        Self {
            scope: Some(scope),
            category: None,
            activity_type: Some(activity_type),
        }
    }
}

/// 时间窗口内的聚合值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTotals {
    pub total_co2e_tonnes: Decimal,
    pub activity_count: i64,
}

// ==========================================
// EmissionSummary - 预聚合汇总行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionSummary {
    pub summary_type: SummaryType,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub filter: SummaryFilter,
    pub total_co2e_tonnes: Decimal,
    pub activity_count: i64,
}
