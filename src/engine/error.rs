// ==========================================
// 排放计算引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层: CalculationError 只影响单条记录；ProcessorError 影响整页/整次运行
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 单条记录计算错误
///
/// 这些错误被收集进运行汇总，不会中断批次。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculationError {
    #[error("字段校验失败 (field={field}): {message}")]
    Validation { field: String, message: String },

    #[error("数值格式错误: {0}")]
    MalformedNumber(String),

    #[error("无法识别的活动类型: {0}")]
    UnrecognizedActivityType(String),

    #[error("单位不一致 (activity_id={activity_id}): 因子单位={factor_unit}, 活动单位={activity_unit}")]
    UnitMismatch {
        activity_id: String,
        factor_unit: String,
        activity_unit: String,
    },
}

impl CalculationError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        CalculationError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// 批处理运行错误
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("页提交失败: {0}")]
    Persistence(#[source] RepositoryError),

    #[error("分页读取失败: {0}")]
    Fetch(#[source] RepositoryError),

    #[error("协作方调用超时: operation={operation}, timeout_ms={timeout_ms}")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("因子索引构建失败: {0}")]
    FactorIndex(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidState { from: String, to: String },

    /// 单条重算时的记录级错误（批量运行中不会出现）
    #[error("记录计算失败: {0}")]
    Record(#[from] CalculationError),
}

/// Result 类型别名
pub type CalculationResult<T> = Result<T, CalculationError>;
pub type ProcessorResult<T> = Result<T, ProcessorError>;
