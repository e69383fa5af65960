// ==========================================
// 排放计算引擎 - 排放计算器
// ==========================================
// 流程: 规范化 → 因子匹配 → 单位校验 → 计算
// 公式: co2e_tonnes = round(activity_amount × co2e_factor / 1000, 4)
// 红线: 不做持久化；单位不一致不做静默换算
// ==========================================

use crate::domain::activity::ActivityRecord;
use crate::domain::result::{CalculationMetadata, EmissionResult};
use crate::domain::types::ActivityType;
use crate::engine::error::{CalculationError, CalculationResult};
use crate::engine::factor_index::FactorCatalog;
use crate::engine::factor_matcher::FactorMatcher;
use crate::engine::normalizer::ActivityNormalizer;
use crate::engine::similarity::{SimilarityScorer, TokenSortRatio};
use crate::engine::unit_converter::UnitConverter;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 未匹配（不是错误，是稳态结果）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFailure {
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub lookup_key: String,
    pub reason: String,
}

/// 单条计算结果
#[derive(Debug, Clone, PartialEq)]
pub enum CalculationOutcome {
    Calculated(EmissionResult),
    Unmatched(MatchFailure),
}

// ==========================================
// EmissionCalculator - 排放计算器
// ==========================================
/// 排放计算器
///
/// 借用本次运行构建好的因子目录与匹配器，自身无状态。
pub struct EmissionCalculator<'a, S = TokenSortRatio> {
    catalog: &'a FactorCatalog,
    matcher: &'a FactorMatcher<S>,
}

impl<'a, S: SimilarityScorer> EmissionCalculator<'a, S> {
    pub fn new(catalog: &'a FactorCatalog, matcher: &'a FactorMatcher<S>) -> Self {
        Self { catalog, matcher }
    }

    /// 计算单条活动（计算日期取当天）
    pub fn calculate(&self, record: &ActivityRecord) -> CalculationResult<CalculationOutcome> {
        self.calculate_on(record, Utc::now().date_naive())
    }

    /// 计算单条活动
    ///
    /// # 返回
    /// - Ok(Calculated): 匹配成功并完成计算
    /// - Ok(Unmatched): 未找到达到阈值的因子
    /// - Err(Validation / MalformedNumber): 输入字段错误或数值溢出
    /// - Err(UnitMismatch): 因子单位与活动单位不一致
    pub fn calculate_on(
        &self,
        record: &ActivityRecord,
        calculation_date: NaiveDate,
    ) -> CalculationResult<CalculationOutcome> {
        let normalized = ActivityNormalizer::normalize(record)?;
        let index = self.catalog.index(normalized.activity_type);
        let outcome = self.matcher.match_factor(index, &normalized.lookup_key);

        let factor = match outcome.factor {
            Some(factor) if outcome.matched => factor,
            _ => {
                tracing::warn!(
                    activity_id = %record.id,
                    activity_type = %normalized.activity_type,
                    lookup_key = %normalized.lookup_key,
                    "未找到匹配的排放因子，跳过"
                );
                return Ok(CalculationOutcome::Unmatched(MatchFailure {
                    activity_id: record.id.clone(),
                    activity_type: normalized.activity_type,
                    reason: format!(
                        "无精确匹配且模糊匹配分数低于阈值 {}",
                        self.matcher.threshold()
                    ),
                    lookup_key: normalized.lookup_key,
                }));
            }
        };

        if !factor.unit.trim().eq_ignore_ascii_case(normalized.unit) {
            tracing::error!(
                activity_id = %record.id,
                factor_id = %factor.factor_id,
                factor_unit = %factor.unit,
                activity_unit = normalized.unit,
                "因子单位与活动单位不一致，参考数据可能已损坏"
            );
            return Err(CalculationError::UnitMismatch {
                activity_id: record.id.clone(),
                factor_unit: factor.unit.clone(),
                activity_unit: normalized.unit.to_string(),
            });
        }

        let co2e_kg = normalized
            .amount
            .checked_mul(factor.co2e_factor)
            .ok_or_else(|| {
                tracing::error!(
                    activity_id = %record.id,
                    amount = %normalized.amount,
                    factor_value = %factor.co2e_factor,
                    "排放量计算溢出"
                );
                CalculationError::validation(
                    "co2e",
                    format!("活动量 {} × 因子 {} 超出数值范围", normalized.amount, factor.co2e_factor),
                )
            })?;
        let co2e_tonnes = UnitConverter::round_output(UnitConverter::kg_to_tonnes(co2e_kg));

        tracing::debug!(
            activity_id = %record.id,
            method = %outcome.method,
            confidence = outcome.confidence,
            %co2e_tonnes,
            "排放计算完成"
        );

        Ok(CalculationOutcome::Calculated(EmissionResult {
            result_id: Uuid::new_v4().to_string(),
            activity_id: record.id.clone(),
            activity_type: normalized.activity_type,
            activity_date: normalized.activity_date,
            factor_id: Some(factor.factor_id.clone()),
            co2e_tonnes,
            confidence: outcome.confidence,
            method: outcome.method,
            calculation_date,
            metadata: CalculationMetadata {
                activity_amount: normalized.amount,
                activity_unit: normalized.unit.to_string(),
                lookup_key: normalized.lookup_key,
                matched_key: factor.lookup_key.clone(),
                factor_value: factor.co2e_factor,
                factor_unit: factor.unit.clone(),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::{
        ActivityPayload, AirTravelActivity, ElectricityActivity, GoodsServicesActivity,
    };
    use crate::domain::emission_factor::EmissionFactor;
    use crate::domain::types::{FlightRange, MatchMethod, Scope};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn catalog() -> FactorCatalog {
        FactorCatalog::build(vec![
            EmissionFactor::new(
                "EF-UK",
                ActivityType::Electricity,
                "United Kingdom",
                "kWh",
                dec("0.3"),
                Scope::Scope2,
                None,
            ),
            EmissionFactor::new(
                "EF-LH-BIZ",
                ActivityType::AirTravel,
                "Long-haul, Business class",
                "kilometres",
                dec("0.04696"),
                Scope::Scope3,
                Some(6),
            ),
            EmissionFactor::new(
                "EF-PAPER",
                ActivityType::GoodsServices,
                "Paper products",
                "kWh",
                dec("0.5"),
                Scope::Scope3,
                Some(1),
            ),
        ])
        .unwrap()
    }

    fn electricity(country: &str, kwh: &str) -> ActivityRecord {
        ActivityRecord::new(
            "E1",
            "15/03/2024",
            ActivityPayload::Electricity(ElectricityActivity {
                country: country.to_string(),
                usage_kwh: dec(kwh),
            }),
        )
    }

    fn calc_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    #[test]
    fn test_electricity_exact() {
        let catalog = catalog();
        let matcher = FactorMatcher::default();
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let outcome = calculator
            .calculate_on(&electricity("United Kingdom", "1000"), calc_date())
            .unwrap();
        let CalculationOutcome::Calculated(result) = outcome else {
            panic!("expected a calculated result");
        };
        assert_eq!(result.co2e_tonnes, dec("0.3"));
        assert_eq!(result.method, MatchMethod::Exact);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.factor_id.as_deref(), Some("EF-UK"));
        assert_eq!(result.calculation_date, calc_date());
    }

    #[test]
    fn test_air_travel_worked_example() {
        let catalog = catalog();
        let matcher = FactorMatcher::default();
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let record = ActivityRecord::new(
            "T1",
            "15/03/2024",
            ActivityPayload::AirTravel(AirTravelActivity {
                distance_miles: "3,459".to_string(),
                flight_range: FlightRange::LongHaul,
                passenger_class: "Business Class".to_string(),
            }),
        );
        let CalculationOutcome::Calculated(result) =
            calculator.calculate_on(&record, calc_date()).unwrap()
        else {
            panic!("expected a calculated result");
        };

        // 3459 × 1.60934 = 5566.70706 km；× 0.04696 / 1000 = 0.26141256… → 0.2614
        let expected =
            UnitConverter::round_output(dec("5566.70706") * dec("0.04696") / dec("1000"));
        assert_eq!(expected, dec("0.2614"));
        assert_eq!(result.co2e_tonnes, expected);
        assert_eq!(result.method, MatchMethod::Exact);
        assert_eq!(result.metadata.activity_amount, dec("5566.70706"));
    }

    #[test]
    fn test_unmatched_yields_match_failure() {
        let catalog = catalog();
        let matcher = FactorMatcher::default();
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let outcome = calculator
            .calculate_on(&electricity("Atlantis", "10"), calc_date())
            .unwrap();
        match outcome {
            CalculationOutcome::Unmatched(failure) => {
                assert_eq!(failure.activity_id, "E1");
                assert_eq!(failure.lookup_key, "atlantis");
            }
            other => panic!("expected unmatched, got {:?}", other),
        }
    }

    #[test]
    fn test_unit_mismatch_is_error() {
        let catalog = catalog();
        let matcher = FactorMatcher::default();
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let record = ActivityRecord::new(
            "G1",
            "15/03/2024",
            ActivityPayload::GoodsServices(GoodsServicesActivity {
                description: "Paper products".to_string(),
                supplier_category: None,
                spend_gbp: dec("1000"),
            }),
        );
        assert!(matches!(
            calculator.calculate_on(&record, calc_date()),
            Err(CalculationError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn test_overflowing_distance_is_validation_error() {
        let catalog = catalog();
        let matcher = FactorMatcher::default();
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let record = ActivityRecord::new(
            "T-MAX",
            "15/03/2024",
            ActivityPayload::AirTravel(AirTravelActivity {
                distance_miles: "79,228,162,514,264,337,593,543,950,335".to_string(),
                flight_range: FlightRange::LongHaul,
                passenger_class: "Business class".to_string(),
            }),
        );
        assert!(matches!(
            calculator.calculate_on(&record, calc_date()),
            Err(CalculationError::Validation { .. })
        ));
    }

    #[test]
    fn test_overflowing_product_is_validation_error() {
        let catalog = FactorCatalog::build(vec![EmissionFactor::new(
            "EF-BIG",
            ActivityType::Electricity,
            "Testland",
            "kWh",
            dec("1000"),
            Scope::Scope2,
            None,
        )])
        .unwrap();
        let matcher = FactorMatcher::default();
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let mut record = electricity("Testland", "1");
        if let ActivityPayload::Electricity(e) = &mut record.payload {
            e.usage_kwh = Decimal::MAX;
        }
        assert!(matches!(
            calculator.calculate_on(&record, calc_date()),
            Err(CalculationError::Validation { ref field, .. }) if field == "co2e"
        ));
    }

    #[test]
    fn test_validation_error_surfaces() {
        let catalog = catalog();
        let matcher = FactorMatcher::default();
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let mut record = electricity("United Kingdom", "1000");
        record.date = "not a date".to_string();
        assert!(matches!(
            calculator.calculate(&record),
            Err(CalculationError::Validation { .. })
        ));
    }
}
