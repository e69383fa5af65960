// ==========================================
// 排放计算引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: rusqlite 实现的协作方接口（因子来源 / 活动分页 / 结果存储）
// 约束: 所有查询使用参数化
// ==========================================

pub mod activity_repo;
pub mod codec;
pub mod emission_factor_repo;
pub mod emission_result_repo;
pub mod emission_summary_repo;
pub mod error;

// 重导出核心仓储
pub use activity_repo::ActivityRepository;
pub use emission_factor_repo::EmissionFactorRepository;
pub use emission_result_repo::EmissionResultRepository;
pub use emission_summary_repo::EmissionSummaryRepository;
pub use error::{RepositoryError, RepositoryResult};
