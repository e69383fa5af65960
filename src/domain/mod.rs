// ==========================================
// 排放计算引擎 - 领域层
// ==========================================
// 职责: 实体与值类型，不含 I/O
// ==========================================

pub mod activity;
pub mod emission_factor;
pub mod emission_summary;
pub mod lookup_key;
pub mod result;
pub mod summary;
pub mod types;

// 重导出核心实体
pub use activity::{
    ActivityPayload, ActivityRecord, AirTravelActivity, ElectricityActivity,
    GoodsServicesActivity,
};
pub use emission_factor::EmissionFactor;
pub use emission_summary::{AggregateTotals, EmissionSummary, SummaryFilter, SummaryType};
pub use result::{CalculationMetadata, EmissionResult, MatchOutcome};
pub use summary::{ActivityTypeSummary, FailureKind, PageProgress, RecordFailure, RunSummary};
pub use types::{ActivityType, FlightRange, MatchMethod, Scope};
