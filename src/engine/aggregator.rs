// ==========================================
// 排放计算引擎 - 排放汇总聚合器
// ==========================================
// 维度: 总量 / 范围 / 范围+分类 / 活动类型 / 范围+活动类型
// 窗口: 按计算日期（日 / 自然月）
// 规则: 空组合不落库；同一窗口+维度重复聚合时覆盖
// ==========================================

use crate::domain::emission_summary::{EmissionSummary, SummaryFilter, SummaryType};
use crate::domain::types::{ActivityType, Scope};
use crate::engine::unit_converter::UnitConverter;
use crate::repository::emission_result_repo::EmissionResultRepository;
use crate::repository::emission_summary_repo::EmissionSummaryRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use std::sync::Arc;

/// Scope 3 参与汇总的分类（1 = 外购商品与服务，6 = 商务差旅）
pub const SCOPE3_CATEGORIES: [i64; 2] = [1, 6];

// ==========================================
// EmissionAggregator - 汇总聚合器
// ==========================================
pub struct EmissionAggregator {
    results: Arc<EmissionResultRepository>,
    summaries: Arc<EmissionSummaryRepository>,
}

impl EmissionAggregator {
    pub fn new(
        results: Arc<EmissionResultRepository>,
        summaries: Arc<EmissionSummaryRepository>,
    ) -> Self {
        Self { results, summaries }
    }

    /// 聚合某一天
    pub fn aggregate_daily(&self, date: NaiveDate) -> RepositoryResult<Vec<EmissionSummary>> {
        self.aggregate_window(SummaryType::Daily, date, date)
    }

    /// 聚合某一自然月
    ///
    /// # 返回
    /// - Err(ValidationError): 年月不合法
    pub fn aggregate_monthly(
        &self,
        year: i32,
        month: u32,
    ) -> RepositoryResult<Vec<EmissionSummary>> {
        let (from, to) = month_bounds(year, month).ok_or_else(|| {
            RepositoryError::ValidationError(format!("无效的年月: {}-{:02}", year, month))
        })?;
        self.aggregate_window(SummaryType::Monthly, from, to)
    }

    /// 计算并写入一个时间窗口内的全部非空组合
    pub fn aggregate_window(
        &self,
        summary_type: SummaryType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<EmissionSummary>> {
        let mut written = Vec::new();

        for filter in summary_filters() {
            let totals = self.results.aggregate(&filter, from, to)?;
            if totals.activity_count == 0 {
                continue;
            }

            let summary = EmissionSummary {
                summary_type,
                from_date: from,
                to_date: to,
                filter,
                total_co2e_tonnes: UnitConverter::round_output(totals.total_co2e_tonnes),
                activity_count: totals.activity_count,
            };
            self.summaries.upsert(&summary)?;
            written.push(summary);
        }

        tracing::info!(
            summary_type = %summary_type,
            from = %from,
            to = %to,
            summaries = written.len(),
            "排放汇总聚合完成"
        );
        Ok(written)
    }
}

/// 全部聚合组合（固定顺序）
pub fn summary_filters() -> Vec<SummaryFilter> {
    let scopes = [Scope::Scope2, Scope::Scope3];
    let mut filters = vec![SummaryFilter::overall()];

    filters.extend(scopes.iter().map(|scope| SummaryFilter::scope(*scope)));
    filters.extend(
        SCOPE3_CATEGORIES
            .iter()
            .map(|category| SummaryFilter::scope_category(Scope::Scope3, *category)),
    );
    filters.extend(ActivityType::ALL.iter().map(|t| SummaryFilter::activity_type(*t)));
    for scope in scopes {
        for activity_type in ActivityType::ALL {
            filters.push(SummaryFilter::scope_activity(scope, activity_type));
        }
    }
    filters
}

/// 自然月的首末日
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_first.pred_opt()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds() {
        let (from, to) = month_bounds(2024, 2).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, to) = month_bounds(2023, 12).unwrap();
        assert_eq!(to, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        assert!(month_bounds(2024, 13).is_none());
    }

    #[test]
    fn test_summary_filters_cover_all_combinations() {
        let filters = summary_filters();
        // 1 总量 + 2 范围 + 2 分类 + 3 活动类型 + 6 范围×活动类型
        assert_eq!(filters.len(), 14);
        assert_eq!(filters[0], SummaryFilter::overall());
        assert!(filters.contains(&SummaryFilter::scope_category(Scope::Scope3, 6)));
        assert!(filters.contains(&SummaryFilter::scope_activity(
            Scope::Scope2,
            ActivityType::Electricity
        )));
    }
}
