// ==========================================
// 排放计算引擎 - 引擎层
// ==========================================
// 职责: 单位换算 / 因子索引 / 因子匹配 / 排放计算 / 流式批处理 / 汇总聚合
// 红线: 计算与匹配不拼 SQL，数据访问只经协作方接口或仓储
// ==========================================

pub mod aggregator;
pub mod batch_processor;
pub mod calculator;
pub mod collaborators;
pub mod error;
pub mod factor_index;
pub mod factor_matcher;
pub mod normalizer;
pub mod similarity;
pub mod unit_converter;

// 重导出核心引擎
pub use aggregator::EmissionAggregator;
pub use batch_processor::{ProcessorState, ProgressCallback, StreamingBatchProcessor};
pub use calculator::{CalculationOutcome, EmissionCalculator, MatchFailure};
pub use collaborators::{ActivitySource, EmissionFactorSource, ResultStore};
pub use error::{CalculationError, CalculationResult, ProcessorError, ProcessorResult};
pub use factor_index::{FactorCatalog, FactorIndex};
pub use factor_matcher::{FactorMatcher, DEFAULT_FUZZY_THRESHOLD};
pub use normalizer::{ActivityNormalizer, NormalizedActivity};
pub use similarity::{SimilarityScorer, TokenSortRatio};
pub use unit_converter::UnitConverter;
