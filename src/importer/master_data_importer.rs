// ==========================================
// 仓储货位与波次拣选系统 - 主数据导入器
// ==========================================
// 流程:
// 1) 解析 CSV（保留行号）
// 2) 必需列检查
// 3) 逐行映射 + 质量校验（首个错误即中止，带行号）
// 4) 单事务按编码 upsert；任一行写入失败整体回滚
// 约束: 货位占用不随导入变化（upsert 不覆盖占用列）
// ==========================================

use crate::db::SharedConnection;
use crate::importer::dq_validator::DqValidator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{FieldMapper, LOCATION_REQUIRED_COLUMNS, SKU_REQUIRED_COLUMNS};
use crate::importer::file_parser::{CsvParser, RawRow};
use crate::perf::PerfGuard;
use crate::repository::{LocationRepository, SkuRepository};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 主数据类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MasterDataKind {
    Location,
    Sku,
}

impl MasterDataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasterDataKind::Location => "LOCATION",
            MasterDataKind::Sku => "SKU",
        }
    }
}

/// 导入汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub batch_id: String,
    pub kind: MasterDataKind,
    pub rows_read: usize,
    pub rows_imported: usize,
    /// 导入后涉及的主键（按文件行序）
    pub ids: Vec<i64>,
    pub elapsed_ms: u64,
}

// ==========================================
// MasterDataImporter - 主数据导入器
// ==========================================
pub struct MasterDataImporter {
    conn: SharedConnection,
}

impl MasterDataImporter {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn import_locations<P: AsRef<Path>>(&self, path: P) -> ImportResult<ImportSummary> {
        let rows = CsvParser::parse_path(path.as_ref())?;
        self.import_rows(MasterDataKind::Location, rows)
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn import_skus<P: AsRef<Path>>(&self, path: P) -> ImportResult<ImportSummary> {
        let rows = CsvParser::parse_path(path.as_ref())?;
        self.import_rows(MasterDataKind::Sku, rows)
    }

    pub fn import_from_reader<R: Read>(&self, kind: MasterDataKind, reader: R) -> ImportResult<ImportSummary> {
        let rows = CsvParser::parse_reader(reader)?;
        self.import_rows(kind, rows)
    }

    fn import_rows(&self, kind: MasterDataKind, rows: Vec<RawRow>) -> ImportResult<ImportSummary> {
        let started = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let mut perf = PerfGuard::new("import.master_data");
        perf.set_items(rows.len());

        let required = match kind {
            MasterDataKind::Location => LOCATION_REQUIRED_COLUMNS,
            MasterDataKind::Sku => SKU_REQUIRED_COLUMNS,
        };
        FieldMapper::require_columns(&rows, required)?;

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::DatabaseTransactionError(format!("锁获取失败: {}", e)))?;
        let tx = conn.transaction()?;

        let mut dq = DqValidator::new();
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let n = row.row_number;
            let written = match kind {
                MasterDataKind::Location => {
                    let location = FieldMapper::map_location(row)?;
                    dq.validate_location(&location, n)?;
                    LocationRepository::upsert_in(&tx, &location)
                }
                MasterDataKind::Sku => {
                    let sku = FieldMapper::map_sku(row)?;
                    dq.validate_sku(&sku, n)?;
                    SkuRepository::upsert_in(&tx, &sku)
                }
            };
            match written {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!(batch_id = %batch_id, row = n, error = %e, "主数据写入失败，事务回滚");
                    return Err(ImportError::DatabaseWriteError {
                        row: n,
                        message: e.to_string(),
                    });
                }
            }
        }
        tx.commit()?;

        let summary = ImportSummary {
            batch_id,
            kind,
            rows_read: rows.len(),
            rows_imported: ids.len(),
            ids,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            batch_id = %summary.batch_id,
            kind = kind.as_str(),
            rows = summary.rows_imported,
            elapsed_ms = summary.elapsed_ms,
            "主数据导入完成"
        );
        Ok(summary)
    }
}
