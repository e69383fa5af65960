// ==========================================
// 排放计算引擎 - 协作方接口
// ==========================================
// 职责: 定义批处理器依赖的分页读取 / 持久化接口（不包含业务逻辑）
// 实现者: repository 层（rusqlite）；测试中为内存实现
// 约束: persist_results 必须按页原子提交
// 约束: 结果存储必须保证同一 activity_id 至多一个结果
// ==========================================

use crate::domain::activity::ActivityRecord;
use crate::domain::emission_factor::EmissionFactor;
use crate::domain::result::EmissionResult;
use crate::domain::types::ActivityType;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// EmissionFactorSource - 参考因子来源
// ==========================================
#[async_trait]
pub trait EmissionFactorSource: Send + Sync {
    /// 读取全部启用的排放因子（构建索引用，单次运行只调用一次）
    async fn load_active_factors(&self) -> RepositoryResult<Vec<EmissionFactor>>;
}

// ==========================================
// ActivitySource - 活动记录分页来源
// ==========================================
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// 按 id 升序分页读取某一活动类型的活动记录
    ///
    /// # 参数
    /// - activity_type: 活动类型
    /// - cursor: 上一页最后一条记录的 id（None 表示从头开始）
    /// - page_size: 页大小
    ///
    /// # 返回
    /// - Ok(Vec): 本页记录（为空表示已读完）
    async fn fetch_pending(
        &self,
        activity_type: ActivityType,
        cursor: Option<&str>,
        page_size: usize,
    ) -> RepositoryResult<Vec<ActivityRecord>>;
}

// ==========================================
// ResultStore - 排放结果存储
// ==========================================
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 按 activity_id 升序分页读取已有结果的活动 id
    ///
    /// # 参数
    /// - cursor: 上一页最后一个 activity_id（None 表示从头开始）
    /// - page_size: 页大小
    async fn fetch_existing_result_ids(
        &self,
        cursor: Option<&str>,
        page_size: usize,
    ) -> RepositoryResult<Vec<String>>;

    /// 持久化一页结果
    ///
    /// # 返回
    /// - Ok(usize): 写入条数
    /// - Err: 整页回滚，已写入部分不可见
    async fn persist_results(&self, results: &[EmissionResult]) -> RepositoryResult<usize>;

    /// 删除某活动的结果（重算时使用）
    ///
    /// # 返回
    /// - Ok(true): 删除了一条结果
    /// - Ok(false): 原本就没有结果
    async fn delete_by_activity_id(&self, activity_id: &str) -> RepositoryResult<bool>;
}
