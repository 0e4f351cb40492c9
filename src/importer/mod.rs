// ==========================================
// 仓储货位与波次拣选系统 - 导入层
// ==========================================
// 职责: 外部主数据导入（货位 / SKU）
// 支持: CSV
// ==========================================

pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod master_data_importer;

// 重导出核心类型
pub use dq_validator::DqValidator;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper;
pub use file_parser::{CsvParser, RawRow};
pub use master_data_importer::{ImportSummary, MasterDataImporter, MasterDataKind};
