// ==========================================
// 排放计算引擎 - 流式批处理器
// ==========================================
// 状态机: Idle → BuildingIndex → Processing(type) → Committing(type)
//         → Processing(type) → … → Done | Failed
// 内存: 每次只物化一页活动记录；已有结果只保留 id 集合
// 提交: 每页一次原子提交，页失败回滚并上抛；单条记录失败只进入汇总
// 取消: 只在页边界检查，不会中断进行中的页
// ==========================================

use crate::config::EngineConfig;
use crate::domain::activity::ActivityRecord;
use crate::domain::result::EmissionResult;
use crate::domain::summary::{
    ActivityTypeSummary, FailureKind, PageProgress, RecordFailure, RunSummary,
};
use crate::domain::types::ActivityType;
use crate::engine::calculator::{CalculationOutcome, EmissionCalculator};
use crate::engine::collaborators::{ActivitySource, EmissionFactorSource, ResultStore};
use crate::engine::error::{CalculationError, ProcessorError, ProcessorResult};
use crate::engine::factor_index::FactorCatalog;
use crate::engine::factor_matcher::FactorMatcher;
use crate::engine::similarity::SimilarityScorer;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 页提交后的进度回调
pub type ProgressCallback = Box<dyn Fn(&PageProgress) + Send + Sync>;

// ==========================================
// ProcessorState - 运行状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    BuildingIndex,
    Processing(ActivityType),
    Committing(ActivityType),
    Done,
    Failed,
}

impl ProcessorState {
    /// 是否允许转换到目标状态
    pub fn can_transition_to(&self, next: ProcessorState) -> bool {
        use ProcessorState::*;
        match (*self, next) {
            (Idle | Done | Failed, BuildingIndex) => true,
            (BuildingIndex, Processing(_)) => true,
            (Processing(current), Committing(target)) => current == target,
            (Committing(current), Processing(target)) => current == target,
            // 当前类型读完后进入下一类型
            (Processing(current), Processing(target)) => target > current,
            (Processing(_) | Committing(_), Done) => true,
            (BuildingIndex | Processing(_) | Committing(_), Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessorState::Done | ProcessorState::Failed)
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorState::Idle => write!(f, "IDLE"),
            ProcessorState::BuildingIndex => write!(f, "BUILDING_INDEX"),
            ProcessorState::Processing(t) => write!(f, "PROCESSING({})", t),
            ProcessorState::Committing(t) => write!(f, "COMMITTING({})", t),
            ProcessorState::Done => write!(f, "DONE"),
            ProcessorState::Failed => write!(f, "FAILED"),
        }
    }
}

/// 单页计算产物（提交前）
struct PageOutcome {
    stats: ActivityTypeSummary,
    results: Vec<EmissionResult>,
    failures: Vec<RecordFailure>,
}

// ==========================================
// StreamingBatchProcessor - 流式批处理器
// ==========================================
/// 流式批处理器
///
/// # 职责
/// 1. 分页读取已有结果 id，构建续跑集合
/// 2. 构建本次运行的只读因子目录
/// 3. 按活动类型分页读取、计算、提交
/// 4. 汇总运行统计
///
/// # 红线
/// - 不直接访问数据库，只通过协作方接口
/// - 页内失败不影响同页其他记录
pub struct StreamingBatchProcessor<F: ?Sized, A: ?Sized, R: ?Sized>
where
    F: EmissionFactorSource,
    A: ActivitySource,
    R: ResultStore,
{
    factors: Arc<F>,
    activities: Arc<A>,
    results: Arc<R>,
    config: EngineConfig,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
    state: ProcessorState,
}

impl<F: ?Sized, A: ?Sized, R: ?Sized> StreamingBatchProcessor<F, A, R>
where
    F: EmissionFactorSource,
    A: ActivitySource,
    R: ResultStore,
{
    /// 创建批处理器
    ///
    /// # 参数
    /// - factors: 参考因子来源
    /// - activities: 活动记录分页来源
    /// - results: 结果存储
    /// - config: 引擎配置（阈值 / 页大小 / 超时）
    pub fn new(factors: Arc<F>, activities: Arc<A>, results: Arc<R>, config: EngineConfig) -> Self {
        Self {
            factors,
            activities,
            results,
            config,
            cancel: CancellationToken::new(),
            progress: None,
            state: ProcessorState::Idle,
        }
    }

    /// 使用外部取消信号
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// 注册页级进度回调
    pub fn with_progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(&PageProgress) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ==========================================
    // 批量运行
    // ==========================================

    /// 执行一次完整运行
    ///
    /// # 返回
    /// - Ok(RunSummary): 运行完成（含取消后的干净停止）
    /// - Err(Persistence): 某页提交失败，该页已回滚，之前的页保持已提交
    /// - Err(Fetch / Timeout / FactorIndex): 运行中止
    pub async fn run(&mut self) -> ProcessorResult<RunSummary> {
        self.transition(ProcessorState::BuildingIndex)?;
        tracing::info!(
            page_size = self.config.page_size,
            fuzzy_threshold = self.config.fuzzy_threshold,
            "开始排放计算批处理"
        );

        match self.run_pages().await {
            Ok(summary) => {
                self.transition(ProcessorState::Done)?;
                tracing::info!(
                    total_processed = summary.total_processed,
                    total_matched = summary.total_matched,
                    total_unmatched = summary.total_unmatched,
                    total_errors = summary.total_errors,
                    total_co2e_tonnes = %summary.total_co2e_tonnes,
                    pages_committed = summary.pages_committed,
                    cancelled = summary.cancelled,
                    "排放计算批处理完成"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(state = %self.state, error = %e, "排放计算批处理失败");
                self.state = ProcessorState::Failed;
                Err(e)
            }
        }
    }

    async fn run_pages(&mut self) -> ProcessorResult<RunSummary> {
        let factors = self
            .bounded("load_active_factors", self.factors.load_active_factors())
            .await?
            .map_err(ProcessorError::Fetch)?;
        let catalog = FactorCatalog::build(factors)?;
        let mut existing_ids = self.load_existing_result_ids().await?;

        let matcher = FactorMatcher::new(self.config.fuzzy_threshold);
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let mut summary = RunSummary {
            existing_results: existing_ids.len(),
            ..RunSummary::default()
        };
        let page_size = self.config.page_size.max(1);

        'types: for activity_type in ActivityType::ALL {
            self.transition(ProcessorState::Processing(activity_type))?;
            let mut cursor: Option<String> = None;
            let mut page_index = 0usize;

            loop {
                if self.cancel.is_cancelled() {
                    tracing::info!(
                        activity_type = %activity_type,
                        pages_committed = summary.pages_committed,
                        "收到取消信号，在页边界停止"
                    );
                    summary.cancelled = true;
                    break 'types;
                }

                let page = self
                    .bounded(
                        "fetch_pending",
                        self.activities
                            .fetch_pending(activity_type, cursor.as_deref(), page_size),
                    )
                    .await?
                    .map_err(ProcessorError::Fetch)?;
                if page.is_empty() {
                    break;
                }

                let fetched = page.len();
                summary.peak_page_records = summary.peak_page_records.max(fetched);
                let next_cursor = page.last().map(|record| record.id.clone());

                let pending: Vec<&ActivityRecord> = page
                    .iter()
                    .filter(|record| !existing_ids.contains(&record.id))
                    .collect();

                if !pending.is_empty() {
                    let outcome = Self::calculate_page(&calculator, activity_type, &pending);
                    self.commit_page(activity_type, &outcome.results).await?;

                    existing_ids.extend(outcome.results.iter().map(|r| r.activity_id.clone()));
                    let progress = PageProgress {
                        activity_type,
                        page_index,
                        records_in_page: pending.len(),
                        matched: outcome.stats.matched,
                        unmatched: outcome.stats.unmatched,
                        errors: outcome.stats.errors,
                        page_co2e_tonnes: outcome.stats.total_co2e_tonnes,
                    };
                    summary.absorb_page(activity_type, &outcome.stats, outcome.failures);

                    tracing::info!(
                        activity_type = %activity_type,
                        page_index,
                        records = progress.records_in_page,
                        matched = progress.matched,
                        unmatched = progress.unmatched,
                        errors = progress.errors,
                        "页已提交"
                    );
                    if let Some(callback) = &self.progress {
                        callback(&progress);
                    }
                } else {
                    tracing::debug!(
                        activity_type = %activity_type,
                        page_index,
                        "本页记录均已有结果，跳过"
                    );
                }

                // 游标只在本页提交后推进
                cursor = next_cursor;
                page_index += 1;
                if fetched < page_size {
                    break;
                }
            }
        }

        Ok(summary)
    }

    /// 分页读取已有结果 id（只保留 id，不物化结果行）
    async fn load_existing_result_ids(&self) -> ProcessorResult<HashSet<String>> {
        let page_size = self.config.existing_ids_page_size.max(1);
        let mut ids = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .bounded(
                    "fetch_existing_result_ids",
                    self.results
                        .fetch_existing_result_ids(cursor.as_deref(), page_size),
                )
                .await?
                .map_err(ProcessorError::Fetch)?;

            let fetched = page.len();
            cursor = page.last().cloned();
            ids.extend(page);
            if fetched < page_size {
                break;
            }
        }

        tracing::debug!(existing = ids.len(), "已有结果 id 集合构建完成");
        Ok(ids)
    }

    /// 计算一页（纯 CPU，不做 I/O）
    fn calculate_page<S>(
        calculator: &EmissionCalculator<'_, S>,
        activity_type: ActivityType,
        records: &[&ActivityRecord],
    ) -> PageOutcome
    where
        S: SimilarityScorer,
    {
        let mut outcome = PageOutcome {
            stats: ActivityTypeSummary::default(),
            results: Vec::with_capacity(records.len()),
            failures: Vec::new(),
        };

        for record in records {
            match calculator.calculate(record) {
                Ok(CalculationOutcome::Calculated(result)) => {
                    outcome.stats.record_match(result.method, result.co2e_tonnes);
                    outcome.results.push(result);
                }
                Ok(CalculationOutcome::Unmatched(failure)) => {
                    outcome.stats.record_unmatched();
                    outcome.failures.push(RecordFailure {
                        activity_id: failure.activity_id,
                        activity_type,
                        kind: FailureKind::Unmatched,
                        reason: format!("{} (lookup_key={})", failure.reason, failure.lookup_key),
                    });
                }
                Err(e) => {
                    let kind = failure_kind(&e);
                    if kind != FailureKind::UnitMismatch {
                        tracing::warn!(activity_id = %record.id, error = %e, "记录校验失败，跳过");
                    }
                    outcome.stats.record_error();
                    outcome.failures.push(RecordFailure {
                        activity_id: record.id.clone(),
                        activity_type,
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    /// 原子提交一页结果
    async fn commit_page(
        &mut self,
        activity_type: ActivityType,
        results: &[EmissionResult],
    ) -> ProcessorResult<()> {
        self.transition(ProcessorState::Committing(activity_type))?;

        if !results.is_empty() {
            let persisted = self
                .bounded("persist_results", self.results.persist_results(results))
                .await?;
            if let Err(e) = persisted {
                tracing::error!(
                    activity_type = %activity_type,
                    results = results.len(),
                    error = %e,
                    "页提交失败，已回滚"
                );
                return Err(ProcessorError::Persistence(e));
            }
        }

        self.transition(ProcessorState::Processing(activity_type))
    }

    // ==========================================
    // 单条重算
    // ==========================================

    /// 重算单条活动并替换已存结果
    ///
    /// # 返回
    /// - Ok(Calculated): 新结果已写入（按 activity_id 覆盖）
    /// - Ok(Unmatched): 现已无匹配因子，旧结果已删除
    /// - Err(Record): 记录本身有错误，旧结果保持不变
    pub async fn recalculate_activity(
        &self,
        record: &ActivityRecord,
    ) -> ProcessorResult<CalculationOutcome> {
        let factors = self
            .bounded("load_active_factors", self.factors.load_active_factors())
            .await?
            .map_err(ProcessorError::Fetch)?;
        let catalog = FactorCatalog::build(factors)?;
        let matcher = FactorMatcher::new(self.config.fuzzy_threshold);
        let calculator = EmissionCalculator::new(&catalog, &matcher);

        let outcome = calculator.calculate(record)?;
        match &outcome {
            CalculationOutcome::Calculated(result) => {
                self.bounded(
                    "persist_results",
                    self.results.persist_results(std::slice::from_ref(result)),
                )
                .await?
                .map_err(ProcessorError::Persistence)?;
                tracing::info!(
                    activity_id = %record.id,
                    co2e_tonnes = %result.co2e_tonnes,
                    "活动已重算"
                );
            }
            CalculationOutcome::Unmatched(_) => {
                let removed = self
                    .bounded(
                        "delete_by_activity_id",
                        self.results.delete_by_activity_id(&record.id),
                    )
                    .await?
                    .map_err(ProcessorError::Persistence)?;
                tracing::warn!(
                    activity_id = %record.id,
                    removed_previous = removed,
                    "重算后无匹配因子"
                );
            }
        }

        Ok(outcome)
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn transition(&mut self, next: ProcessorState) -> ProcessorResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ProcessorError::InvalidState {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %self.state, to = %next, "状态转换");
        self.state = next;
        Ok(())
    }

    /// 为协作方调用加超时
    async fn bounded<T, Fut>(&self, operation: &str, future: Fut) -> ProcessorResult<T>
    where
        Fut: Future<Output = T>,
    {
        let timeout_ms = self.config.collaborator_timeout_ms;
        tokio::time::timeout(Duration::from_millis(timeout_ms), future)
            .await
            .map_err(|_| {
                tracing::error!(operation, timeout_ms, "协作方调用超时");
                ProcessorError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms,
                }
            })
    }
}

fn failure_kind(error: &CalculationError) -> FailureKind {
    match error {
        CalculationError::Validation { .. } | CalculationError::MalformedNumber(_) => {
            FailureKind::Validation
        }
        CalculationError::UnrecognizedActivityType(_) => FailureKind::UnrecognizedActivityType,
        CalculationError::UnitMismatch { .. } => FailureKind::UnitMismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use ProcessorState::*;
        let e = ActivityType::Electricity;
        let a = ActivityType::AirTravel;

        assert!(Idle.can_transition_to(BuildingIndex));
        assert!(BuildingIndex.can_transition_to(Processing(e)));
        assert!(Processing(e).can_transition_to(Committing(e)));
        assert!(Committing(e).can_transition_to(Processing(e)));
        assert!(Processing(e).can_transition_to(Processing(a)));
        assert!(Processing(a).can_transition_to(Done));
        assert!(Done.can_transition_to(BuildingIndex));

        assert!(!Idle.can_transition_to(Processing(e)));
        assert!(!Processing(a).can_transition_to(Processing(e)));
        assert!(!Committing(e).can_transition_to(Processing(a)));
        assert!(!Done.can_transition_to(Processing(e)));
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            failure_kind(&CalculationError::MalformedNumber("x".into())),
            FailureKind::Validation
        );
        assert_eq!(
            failure_kind(&CalculationError::UnrecognizedActivityType("Rail".into())),
            FailureKind::UnrecognizedActivityType
        );
        assert!(ProcessorState::Failed.is_terminal());
        assert!(!ProcessorState::Committing(ActivityType::Electricity).is_terminal());
    }
}
