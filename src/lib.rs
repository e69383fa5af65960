// ==========================================
// 排放计算引擎 - 核心库
// ==========================================
// 职责: 排放因子匹配 + 碳排放批量计算 + 汇总聚合
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 匹配与计算
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 运行参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ActivityType, FlightRange, MatchMethod, Scope};

// 领域实体
pub use domain::{
    ActivityPayload, ActivityRecord, EmissionFactor, EmissionResult, EmissionSummary,
    RunSummary,
};

// 引擎
pub use engine::{
    EmissionAggregator, EmissionCalculator, FactorCatalog, FactorMatcher,
    StreamingBatchProcessor,
};

// 配置
pub use config::{ConfigManager, EngineConfig};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "排放计算引擎";
