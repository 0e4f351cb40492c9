// ==========================================
// 仓储货位与波次拣选系统 - 字段映射器
// ==========================================
// 职责: 原始行 → 领域实体 + 类型转换
// 约定: 列名小写；支持少量中文别名
// ==========================================

use crate::domain::location::Location;
use crate::domain::sku::Sku;
use crate::domain::types::{LocationType, VelocityClass};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use std::str::FromStr;

/// 货位主数据必需列
pub const LOCATION_REQUIRED_COLUMNS: &[&str] = &["code", "zone", "max_volume", "max_weight_kg"];

/// SKU 主数据必需列
pub const SKU_REQUIRED_COLUMNS: &[&str] = &["code", "unit_weight_kg", "unit_volume"];

pub struct FieldMapper;

impl FieldMapper {
    pub fn map_location(row: &RawRow) -> ImportResult<Location> {
        let n = row.row_number;
        Ok(Location {
            location_id: 0,
            code: Self::required(row, "code")?.to_string(),
            zone: Self::required(row, "zone")?.to_string(),
            velocity_class: Self::parse_enum(row, "velocity_class")?.unwrap_or(VelocityClass::Warm),
            location_type: Self::parse_enum(row, "location_type")?.unwrap_or(LocationType::Shelf),
            x: Self::parse_f64(row, "x")?,
            y: Self::parse_f64(row, "y")?,
            z: Self::parse_f64(row, "z")?,
            width_cm: Self::parse_f64(row, "width_cm")?.unwrap_or(0.0),
            depth_cm: Self::parse_f64(row, "depth_cm")?.unwrap_or(0.0),
            height_cm: Self::parse_f64(row, "height_cm")?.unwrap_or(0.0),
            max_volume: Self::parse_f64(row, "max_volume")?.ok_or_else(|| missing(n, "max_volume"))?,
            max_weight_kg: Self::parse_f64(row, "max_weight_kg")?
                .ok_or_else(|| missing(n, "max_weight_kg"))?,
            occupied_volume: 0.0,
            occupied_weight_kg: 0.0,
            hazmat_allowed: Self::parse_bool(row, "hazmat_allowed")?.unwrap_or(false),
            temperature_controlled: Self::parse_bool(row, "temperature_controlled")?.unwrap_or(false),
            current_temperature: Self::parse_f64(row, "current_temperature")?,
            active: Self::parse_bool(row, "active")?.unwrap_or(true),
            picking_priority: Self::parse_i32(row, "picking_priority")?.unwrap_or(0),
        })
    }

    pub fn map_sku(row: &RawRow) -> ImportResult<Sku> {
        let n = row.row_number;
        Ok(Sku {
            sku_id: 0,
            code: Self::required(row, "code")?.to_string(),
            description: Self::get(row, "description").map(str::to_string),
            length_cm: Self::parse_f64(row, "length_cm")?.unwrap_or(0.0),
            width_cm: Self::parse_f64(row, "width_cm")?.unwrap_or(0.0),
            height_cm: Self::parse_f64(row, "height_cm")?.unwrap_or(0.0),
            unit_weight_kg: Self::parse_f64(row, "unit_weight_kg")?
                .ok_or_else(|| missing(n, "unit_weight_kg"))?,
            unit_volume: Self::parse_f64(row, "unit_volume")?.ok_or_else(|| missing(n, "unit_volume"))?,
            hazardous: Self::parse_bool(row, "hazardous")?.unwrap_or(false),
            fragile: Self::parse_bool(row, "fragile")?.unwrap_or(false),
            requires_temp_control: Self::parse_bool(row, "requires_temp_control")?.unwrap_or(false),
            temp_min: Self::parse_f64(row, "temp_min")?,
            temp_max: Self::parse_f64(row, "temp_max")?,
            food_category: Self::parse_bool(row, "food_category")?.unwrap_or(false),
            food_incompatible: Self::parse_bool(row, "food_incompatible")?.unwrap_or(false),
        })
    }

    /// 检查必需列是否存在（以首行表头为准，支持别名）
    pub fn require_columns(rows: &[RawRow], columns: &[&str]) -> ImportResult<()> {
        let Some(first) = rows.first() else {
            return Ok(());
        };
        for column in columns {
            if !aliases(column).iter().any(|a| first.fields.contains_key(*a)) {
                return Err(ImportError::MissingColumn(column.to_string()));
            }
        }
        Ok(())
    }

    /// 取字段值，支持别名
    fn get<'r>(row: &'r RawRow, key: &str) -> Option<&'r str> {
        aliases(key).iter().find_map(|alias| row.get(alias))
    }

    fn required<'r>(row: &'r RawRow, key: &str) -> ImportResult<&'r str> {
        Self::get(row, key).ok_or_else(|| missing(row.row_number, key))
    }

    fn parse_f64(row: &RawRow, key: &str) -> ImportResult<Option<f64>> {
        match Self::get(row, key) {
            None => Ok(None),
            Some(value) => value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| conversion(row.row_number, key, format!("无法解析为浮点数: {}", value))),
        }
    }

    fn parse_i32(row: &RawRow, key: &str) -> ImportResult<Option<i32>> {
        match Self::get(row, key) {
            None => Ok(None),
            Some(value) => value
                .parse::<i32>()
                .map(Some)
                .map_err(|_| conversion(row.row_number, key, format!("无法解析为整数: {}", value))),
        }
    }

    /// 布尔: 1/0, true/false, y/n, yes/no, 是/否
    fn parse_bool(row: &RawRow, key: &str) -> ImportResult<Option<bool>> {
        match Self::get(row, key) {
            None => Ok(None),
            Some(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "y" | "yes" | "是" => Ok(Some(true)),
                "0" | "false" | "n" | "no" | "否" => Ok(Some(false)),
                _ => Err(conversion(row.row_number, key, format!("无法解析为布尔值: {}", value))),
            },
        }
    }

    fn parse_enum<T: FromStr<Err = String>>(row: &RawRow, key: &str) -> ImportResult<Option<T>> {
        match Self::get(row, key) {
            None => Ok(None),
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|message| conversion(row.row_number, key, message)),
        }
    }
}

fn aliases(key: &str) -> Vec<&str> {
    match key {
        "code" => vec!["code", "编码"],
        "zone" => vec!["zone", "库区"],
        "description" => vec!["description", "描述"],
        _ => vec![key],
    }
}

fn missing(row: usize, field: &str) -> ImportError {
    ImportError::MissingField {
        row,
        field: field.to_string(),
    }
}

fn conversion(row: usize, field: &str, message: String) -> ImportError {
    ImportError::TypeConversionError {
        row,
        field: field.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn raw(row_number: usize, pairs: &[(&str, &str)]) -> RawRow {
        RawRow {
            row_number,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_map_location_with_defaults() {
        let row = raw(
            2,
            &[
                ("编码", "A-01-01"),
                ("zone", "A"),
                ("velocity_class", "hot"),
                ("max_volume", "1000"),
                ("max_weight_kg", "250.5"),
                ("x", "3"),
            ],
        );
        let loc = FieldMapper::map_location(&row).unwrap();
        assert_eq!(loc.code, "A-01-01");
        assert_eq!(loc.velocity_class, VelocityClass::Hot);
        assert_eq!(loc.location_type, LocationType::Shelf);
        assert_eq!(loc.x, Some(3.0));
        assert_eq!(loc.y, None);
        assert!(loc.active);
        assert_eq!(loc.occupied_volume, 0.0);
    }

    #[test]
    fn test_row_errors_carry_row_number() {
        let row = raw(7, &[("code", "A-01"), ("zone", "A"), ("max_volume", "abc"), ("max_weight_kg", "1")]);
        let err = FieldMapper::map_location(&row).unwrap_err();
        assert_eq!(err.row(), Some(7));
        assert!(matches!(err, ImportError::TypeConversionError { ref field, .. } if field == "max_volume"));

        let row = raw(9, &[("code", "S-1"), ("unit_weight_kg", "1")]);
        let err = FieldMapper::map_sku(&row).unwrap_err();
        assert!(matches!(err, ImportError::MissingField { row: 9, ref field } if field == "unit_volume"));

        let row = raw(4, &[("code", "S-1"), ("unit_weight_kg", "1"), ("unit_volume", "1"), ("hazardous", "maybe")]);
        assert_eq!(FieldMapper::map_sku(&row).unwrap_err().row(), Some(4));
    }

    #[test]
    fn test_require_columns_honours_aliases() {
        let rows = vec![raw(2, &[("编码", "A-01"), ("zone", "A"), ("max_volume", "1")])];
        let err = FieldMapper::require_columns(&rows, LOCATION_REQUIRED_COLUMNS).unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn(ref c) if c == "max_weight_kg"));
        assert!(FieldMapper::require_columns(&[], LOCATION_REQUIRED_COLUMNS).is_ok());
    }
}
