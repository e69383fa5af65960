// ==========================================
// 排放计算引擎 - 排放因子索引
// ==========================================
// 职责: 每次运行由启用因子构建一次，只读
// 提供: 规范化键 O(1) 精确查找 + 按键有序的模糊候选集
// 约束: 同一活动类型内启用因子的 lookup_key 必须唯一
// ==========================================

use crate::domain::emission_factor::EmissionFactor;
use crate::domain::lookup_key::normalize_key;
use crate::domain::types::ActivityType;
use crate::engine::error::{ProcessorError, ProcessorResult};
use std::collections::HashMap;

// ==========================================
// FactorIndex - 单活动类型的因子索引
// ==========================================
#[derive(Debug, Clone)]
pub struct FactorIndex {
    activity_type: ActivityType,
    // 按 lookup_key 升序，保证模糊匹配的平局裁决可复现
    factors: Vec<EmissionFactor>,
    by_key: HashMap<String, usize>,
}

impl FactorIndex {
    /// 由因子行构建索引
    ///
    /// # 说明
    /// - 只收录 `active = true` 且活动类型一致的因子
    /// - 重复的启用键视为参考数据损坏，返回错误
    pub fn build(
        activity_type: ActivityType,
        factors: impl IntoIterator<Item = EmissionFactor>,
    ) -> ProcessorResult<Self> {
        let mut factors: Vec<EmissionFactor> = factors
            .into_iter()
            .filter(|f| f.active && f.activity_type == activity_type)
            .collect();
        factors.sort_by(|a, b| a.lookup_key.cmp(&b.lookup_key));

        let mut by_key = HashMap::with_capacity(factors.len());
        for (idx, factor) in factors.iter().enumerate() {
            if let Some(prev) = by_key.insert(factor.lookup_key.clone(), idx) {
                return Err(ProcessorError::FactorIndex(format!(
                    "活动类型 {} 存在重复的启用因子键 '{}' (factor_id={} / {})",
                    activity_type, factor.lookup_key, factors[prev].factor_id, factor.factor_id
                )));
            }
        }

        tracing::debug!(
            activity_type = %activity_type,
            factor_count = factors.len(),
            "因子索引构建完成"
        );

        Ok(Self {
            activity_type,
            factors,
            by_key,
        })
    }

    /// 精确查找（入参会再做一次规范化）
    pub fn exact(&self, lookup_key: &str) -> Option<&EmissionFactor> {
        self.by_key
            .get(&normalize_key(lookup_key))
            .map(|&idx| &self.factors[idx])
    }

    /// 模糊匹配候选集，按键升序
    pub fn candidates(&self) -> impl Iterator<Item = (&str, &EmissionFactor)> + '_ {
        self.factors.iter().map(|f| (f.lookup_key.as_str(), f))
    }

    pub fn activity_type(&self) -> ActivityType {
        self.activity_type
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

// ==========================================
// FactorCatalog - 全部活动类型的索引集合
// ==========================================
#[derive(Debug, Clone)]
pub struct FactorCatalog {
    indexes: HashMap<ActivityType, FactorIndex>,
}

impl FactorCatalog {
    /// 按活动类型分组构建索引
    pub fn build(factors: impl IntoIterator<Item = EmissionFactor>) -> ProcessorResult<Self> {
        let mut grouped: HashMap<ActivityType, Vec<EmissionFactor>> = HashMap::new();
        for factor in factors {
            grouped.entry(factor.activity_type).or_default().push(factor);
        }

        let mut indexes = HashMap::new();
        for activity_type in ActivityType::ALL {
            let rows = grouped.remove(&activity_type).unwrap_or_default();
            indexes.insert(activity_type, FactorIndex::build(activity_type, rows)?);
        }
        Ok(Self { indexes })
    }

    pub fn index(&self, activity_type: ActivityType) -> &FactorIndex {
        // build 保证每个活动类型都有条目
        &self.indexes[&activity_type]
    }

    pub fn total_factors(&self) -> usize {
        self.indexes.values().map(FactorIndex::len).sum()
    }
}
