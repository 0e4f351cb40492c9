// ==========================================
// 仓储货位与波次拣选系统 - 行映射辅助
// ==========================================
// 日期存储格式: %Y-%m-%d；时间戳: %Y-%m-%d %H:%M:%S
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use std::str::FromStr;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

pub fn fmt_datetime(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FMT).to_string()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

/// 解析日期列（格式错误时返回转换错误，不静默兜底）
pub fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_opt_date(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| parse_date(idx, &s)).transpose()
}

pub fn parse_datetime(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn parse_opt_datetime(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_datetime(idx, &s)).transpose()
}

/// 解析封闭枚举列
pub fn parse_enum<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|msg| conversion_error(idx, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::LotStatus;

    #[test]
    fn test_parse_enum_and_date() {
        let status: LotStatus = parse_enum(0, "AVAILABLE").unwrap();
        assert_eq!(status, LotStatus::Available);
        assert!(parse_enum::<LotStatus>(0, "LOST").is_err());

        let d = parse_date(1, "2024-01-01").unwrap();
        assert_eq!(fmt_date(d), "2024-01-01");
        assert!(parse_date(1, "20240101").is_err());
    }
}
