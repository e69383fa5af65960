// ==========================================
// 排放计算引擎 - 排放因子匹配
// ==========================================
// 分级策略（按序执行）:
//   1. 精确匹配: 规范化键查索引，置信度 1.0
//   2. 模糊匹配: 与全部候选键计算词序无关相似度，取最高分；
//      低于阈值则拒绝；同分取键字典序最小者
//   3. 未匹配: 不计算排放，由批处理计入汇总后继续
// ==========================================

use crate::domain::emission_factor::EmissionFactor;
use crate::domain::result::MatchOutcome;
use crate::engine::factor_index::FactorIndex;
use crate::engine::similarity::{SimilarityScorer, TokenSortRatio};

/// 默认模糊匹配阈值（0-100）
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 80.0;

// ==========================================
// FactorMatcher - 分级因子匹配器
// ==========================================
#[derive(Debug, Clone)]
pub struct FactorMatcher<S = TokenSortRatio> {
    scorer: S,
    threshold: f64,
}

impl FactorMatcher<TokenSortRatio> {
    /// 使用默认评分器创建匹配器
    ///
    /// # 参数
    /// - threshold: 模糊匹配阈值（0-100），分数 >= 阈值才接受
    pub fn new(threshold: f64) -> Self {
        Self::with_scorer(TokenSortRatio, threshold)
    }
}

impl Default for FactorMatcher<TokenSortRatio> {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_THRESHOLD)
    }
}

impl<S: SimilarityScorer> FactorMatcher<S> {
    pub fn with_scorer(scorer: S, threshold: f64) -> Self {
        Self {
            scorer,
            threshold: threshold.clamp(0.0, 100.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 分级匹配主入口
    ///
    /// # 参数
    /// - index: 对应活动类型的因子索引
    /// - lookup_key: 记录侧规范化查找键
    ///
    /// # 返回
    /// - MatchOutcome（失败不视为异常）
    pub fn match_factor(&self, index: &FactorIndex, lookup_key: &str) -> MatchOutcome {
        if let Some(factor) = self.exact_match(index, lookup_key) {
            tracing::debug!(
                activity_type = %index.activity_type(),
                lookup_key,
                factor_id = %factor.factor_id,
                "精确匹配"
            );
            return MatchOutcome::exact(factor.clone());
        }

        match self.fuzzy_match(index, lookup_key) {
            Some((factor, score)) => {
                tracing::debug!(
                    activity_type = %index.activity_type(),
                    lookup_key,
                    matched_key = %factor.lookup_key,
                    score,
                    "模糊匹配"
                );
                MatchOutcome::fuzzy(factor.clone(), score)
            }
            None => MatchOutcome::unmatched(),
        }
    }

    /// 第 1 级: 精确匹配
    pub fn exact_match<'a>(
        &self,
        index: &'a FactorIndex,
        lookup_key: &str,
    ) -> Option<&'a EmissionFactor> {
        index.exact(lookup_key)
    }

    /// 第 2 级: 模糊匹配
    ///
    /// # 返回
    /// - Some((因子, 分数)): 最高分且 >= 阈值
    /// - None: 无候选或最高分低于阈值
    ///
    /// # 平局裁决
    /// 候选按键升序遍历，只有严格更高的分数才替换当前最优，
    /// 因此同分时保留字典序最小的键。
    pub fn fuzzy_match<'a>(
        &self,
        index: &'a FactorIndex,
        lookup_key: &str,
    ) -> Option<(&'a EmissionFactor, f64)> {
        if index.is_empty() {
            tracing::warn!(activity_type = %index.activity_type(), "该活动类型没有可用的排放因子");
            return None;
        }

        let mut best: Option<(&EmissionFactor, f64)> = None;
        for (key, factor) in index.candidates() {
            let score = self.scorer.score(lookup_key, key);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((factor, score)),
            }
        }

        let (factor, score) = best?;
        if score < self.threshold {
            tracing::debug!(
                activity_type = %index.activity_type(),
                lookup_key,
                best_key = %factor.lookup_key,
                score,
                threshold = self.threshold,
                "模糊匹配分数低于阈值"
            );
            return None;
        }
        Some((factor, score))
    }
}
