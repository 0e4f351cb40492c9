// ==========================================
// 仓储货位与波次拣选系统 - 主数据质量校验
// ==========================================
// 职责: 映射后的实体做业务范围校验 + 文件内编码查重
// ==========================================

use crate::domain::location::Location;
use crate::domain::sku::Sku;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashMap;

pub struct DqValidator {
    seen_codes: HashMap<String, usize>,
}

impl Default for DqValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DqValidator {
    pub fn new() -> Self {
        Self {
            seen_codes: HashMap::new(),
        }
    }

    pub fn validate_location(&mut self, location: &Location, row: usize) -> ImportResult<()> {
        positive(row, "max_volume", location.max_volume)?;
        positive(row, "max_weight_kg", location.max_weight_kg)?;
        non_negative(row, "width_cm", location.width_cm)?;
        non_negative(row, "depth_cm", location.depth_cm)?;
        non_negative(row, "height_cm", location.height_cm)?;
        if location.picking_priority < 0 {
            return Err(range(row, "picking_priority", location.picking_priority as f64, 0.0, f64::MAX));
        }
        self.check_duplicate(&location.code, row)
    }

    pub fn validate_sku(&mut self, sku: &Sku, row: usize) -> ImportResult<()> {
        positive(row, "unit_volume", sku.unit_volume)?;
        non_negative(row, "unit_weight_kg", sku.unit_weight_kg)?;
        non_negative(row, "length_cm", sku.length_cm)?;
        non_negative(row, "width_cm", sku.width_cm)?;
        non_negative(row, "height_cm", sku.height_cm)?;
        if let (Some(min), Some(max)) = (sku.temp_min, sku.temp_max) {
            if min > max {
                return Err(ImportError::ValidationError {
                    row,
                    message: format!("温度区间无效: temp_min={} > temp_max={}", min, max),
                });
            }
        }
        if sku.hazardous && sku.food_category {
            return Err(ImportError::ValidationError {
                row,
                message: "危险品不能同时标记为食品类".to_string(),
            });
        }
        self.check_duplicate(&sku.code, row)
    }

    fn check_duplicate(&mut self, code: &str, row: usize) -> ImportResult<()> {
        if let Some(&first_row) = self.seen_codes.get(code) {
            return Err(ImportError::DuplicateCode {
                row,
                code: code.to_string(),
                first_row,
            });
        }
        self.seen_codes.insert(code.to_string(), row);
        Ok(())
    }
}

fn positive(row: usize, field: &str, value: f64) -> ImportResult<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(range(row, field, value, f64::MIN_POSITIVE, f64::MAX))
    }
}

fn non_negative(row: usize, field: &str, value: f64) -> ImportResult<()> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(range(row, field, value, 0.0, f64::MAX))
    }
}

fn range(row: usize, field: &str, value: f64, min: f64, max: f64) -> ImportError {
    ImportError::ValueRangeError {
        row,
        field: field.to_string(),
        value,
        min,
        max,
    }
}
