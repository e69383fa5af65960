// ==========================================
// 排放计算引擎 - 运行汇总
// ==========================================
// 职责: 页级统计 / 运行级汇总 / 进度回报
// 说明: 只保存计数与失败摘要，不保存原始行
// ==========================================

use crate::domain::types::{ActivityType, MatchMethod};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// 单条记录失败
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Validation,               // 输入字段格式错误
    UnrecognizedActivityType, // 活动类型标签无法识别
    UnitMismatch,             // 因子单位与活动单位不一致（参考数据损坏）
    Unmatched,                // 未找到达到阈值的因子
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Validation => "VALIDATION",
            FailureKind::UnrecognizedActivityType => "UNRECOGNIZED_ACTIVITY_TYPE",
            FailureKind::UnitMismatch => "UNIT_MISMATCH",
            FailureKind::Unmatched => "UNMATCHED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub kind: FailureKind,
    pub reason: String,
}

// ==========================================
// 按活动类型汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTypeSummary {
    pub processed: usize,
    pub matched: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub unmatched: usize,
    pub errors: usize,
    pub total_co2e_tonnes: Decimal,
}

impl ActivityTypeSummary {
    /// 记录一次成功计算
    pub fn record_match(&mut self, method: MatchMethod, co2e_tonnes: Decimal) {
        self.processed += 1;
        self.matched += 1;
        match method {
            MatchMethod::Exact => self.exact_matches += 1,
            MatchMethod::Fuzzy => self.fuzzy_matches += 1,
            MatchMethod::Unmatched => {}
        }
        self.total_co2e_tonnes += co2e_tonnes;
    }

    pub fn record_unmatched(&mut self) {
        self.processed += 1;
        self.unmatched += 1;
    }

    pub fn record_error(&mut self) {
        self.processed += 1;
        self.errors += 1;
    }

    pub fn merge(&mut self, other: &ActivityTypeSummary) {
        self.processed += other.processed;
        self.matched += other.matched;
        self.exact_matches += other.exact_matches;
        self.fuzzy_matches += other.fuzzy_matches;
        self.unmatched += other.unmatched;
        self.errors += other.errors;
        self.total_co2e_tonnes += other.total_co2e_tonnes;
    }
}

// ==========================================
// 页级进度（只含计数）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageProgress {
    pub activity_type: ActivityType,
    /// 当前活动类型内的页序号（从 0 开始）
    pub page_index: usize,
    /// 本页实际计算的记录数（已排除已有结果的记录）
    pub records_in_page: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub errors: usize,
    pub page_co2e_tonnes: Decimal,
}

// ==========================================
// RunSummary - 运行汇总（供报表协作方消费）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_processed: usize,
    pub total_matched: usize,
    pub total_unmatched: usize,
    pub total_errors: usize,
    pub total_co2e_tonnes: Decimal,
    pub by_activity_type: BTreeMap<ActivityType, ActivityTypeSummary>,
    pub errors: Vec<RecordFailure>,
    pub unmatched: Vec<RecordFailure>,
    /// 已提交页数
    pub pages_committed: usize,
    /// 单页最多物化的记录数（内存上界观测）
    pub peak_page_records: usize,
    /// 运行开始时已存在结果的活动数
    pub existing_results: usize,
    /// 在页边界响应取消
    pub cancelled: bool,
}

impl RunSummary {
    /// 合并一页的统计
    pub fn absorb_page(
        &mut self,
        activity_type: ActivityType,
        page: &ActivityTypeSummary,
        failures: Vec<RecordFailure>,
    ) {
        self.total_processed += page.processed;
        self.total_matched += page.matched;
        self.total_unmatched += page.unmatched;
        self.total_errors += page.errors;
        self.total_co2e_tonnes += page.total_co2e_tonnes;
        self.by_activity_type
            .entry(activity_type)
            .or_default()
            .merge(page);

        for failure in failures {
            if failure.kind == FailureKind::Unmatched {
                self.unmatched.push(failure);
            } else {
                self.errors.push(failure);
            }
        }
        self.pages_committed += 1;
    }

    /// 成功率（百分比）
    pub fn success_rate(&self) -> f64 {
        if self.total_processed == 0 {
            100.0
        } else {
            self.total_matched as f64 / self.total_processed as f64 * 100.0
        }
    }
}
