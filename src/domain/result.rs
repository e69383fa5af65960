// ==========================================
// 排放计算引擎 - 匹配结果与排放结果
// ==========================================
// 不变式: method=Exact ⇒ confidence=1.0
// 不变式: method=Unmatched ⇒ factor 为空
// 生命周期: EmissionResult 创建后不可变，重算以 activity_id 整体替换
// ==========================================

use crate::domain::emission_factor::EmissionFactor;
use crate::domain::types::{ActivityType, MatchMethod};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// MatchOutcome - 因子匹配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub matched: bool,
    pub method: MatchMethod,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub factor: Option<EmissionFactor>,
}

impl MatchOutcome {
    pub fn exact(factor: EmissionFactor) -> Self {
        Self {
            matched: true,
            method: MatchMethod::Exact,
            confidence: 1.0,
            factor: Some(factor),
        }
    }

    /// 模糊匹配，score 为 0-100 的相似度
    pub fn fuzzy(factor: EmissionFactor, score: f64) -> Self {
        Self {
            matched: true,
            method: MatchMethod::Fuzzy,
            confidence: (score / 100.0).clamp(0.0, 1.0),
            factor: Some(factor),
        }
    }

    pub fn unmatched() -> Self {
        Self {
            matched: false,
            method: MatchMethod::Unmatched,
            confidence: 0.0,
            factor: None,
        }
    }
}

// ==========================================
// CalculationMetadata - 计算审计信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationMetadata {
    /// 换算后的活动量
    pub activity_amount: Decimal,
    pub activity_unit: String,
    /// 记录侧规范化查找键
    pub lookup_key: String,
    /// 命中的因子键
    pub matched_key: String,
    pub factor_value: Decimal,
    pub factor_unit: String,
}

// ==========================================
// EmissionResult - 排放计算结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionResult {
    pub result_id: String,
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub activity_date: NaiveDate,
    /// 未匹配时为空
    pub factor_id: Option<String>,
    /// 吨 CO2e，保留 4 位小数（四舍五入）
    pub co2e_tonnes: Decimal,
    pub confidence: f64,
    pub method: MatchMethod,
    pub calculation_date: NaiveDate,
    pub metadata: CalculationMetadata,
}

impl EmissionResult {
    /// 千克 CO2e
    pub fn co2e_kg(&self) -> Decimal {
        self.co2e_tonnes * Decimal::from(1000)
    }
}
