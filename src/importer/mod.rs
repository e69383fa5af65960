// ==========================================
// 排放计算引擎 - 导入层
// ==========================================
// 职责: 参考因子与活动数据的 CSV 导入
// ==========================================

pub mod csv_importer;
pub mod data_cleaner;
pub mod error;
pub mod field_mapper;
pub mod file_parser;

// 重导出核心类型
pub use csv_importer::{CsvImporter, ImportSummary, RowRejection, SeedSummary};
pub use data_cleaner::DataCleaner;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper;
pub use file_parser::{CsvParser, RawRow};
