// ==========================================
// 仓储货位与波次拣选系统 - 维护命令入口
// ==========================================
// 用法:
//   warehouse-slotting [--locations <csv>] [--skus <csv>] [--json-log]
// 流程: 建库 → 可选导入主数据 → 再平衡建议（JSON）→ 对账汇总
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use warehouse_slotting::api::WarehouseApi;
use warehouse_slotting::db::{default_db_path, init_schema, open_sqlite_connection};
use warehouse_slotting::perf::install_sqlite_tracing;
use warehouse_slotting::{logging, APP_NAME, VERSION};

#[derive(Debug, Default)]
struct CliArgs {
    locations: Option<PathBuf>,
    skus: Option<PathBuf>,
    json_log: bool,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--locations" => {
                    let path = args.next().ok_or_else(|| anyhow!("--locations 缺少文件路径"))?;
                    parsed.locations = Some(PathBuf::from(path));
                }
                "--skus" => {
                    let path = args.next().ok_or_else(|| anyhow!("--skus 缺少文件路径"))?;
                    parsed.skus = Some(PathBuf::from(path));
                }
                "--json-log" => parsed.json_log = true,
                other => bail!("未知参数: {}", other),
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;
    if args.json_log {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("==================================================");
    tracing::info!("{} v{}", APP_NAME, VERSION);
    tracing::info!("==================================================");

    let db_path = default_db_path();
    tracing::info!("使用数据库: {}", db_path.display());

    let mut conn = open_sqlite_connection(&db_path.to_string_lossy())
        .with_context(|| format!("无法打开数据库: {}", db_path.display()))?;
    init_schema(&conn).context("建库失败")?;
    install_sqlite_tracing(&mut conn);

    let api = WarehouseApi::from_connection(Arc::new(Mutex::new(conn)))?;

    // 主数据导入：货位先于 SKU 无依赖要求，按参数顺序执行
    if let Some(path) = args.locations {
        let summary = api.import_locations(path).await?;
        tracing::info!(rows = summary.rows_imported, batch_id = %summary.batch_id, "货位主数据已导入");
    }
    if let Some(path) = args.skus {
        let summary = api.import_skus(path).await?;
        tracing::info!(rows = summary.rows_imported, batch_id = %summary.batch_id, "SKU 主数据已导入");
    }

    let suggestions = api.rebalance_suggestions().await?;
    println!("{}", serde_json::to_string_pretty(&suggestions)?);

    let summary = api.reconcile_all().await?;
    println!(
        "对账: {} 条, 不平衡 {} 条",
        summary.total, summary.unbalanced
    );
    for entry in summary.entries.iter().filter(|e| !e.is_balanced()) {
        println!(
            "  tenant={} sku={} logical={} lots={}",
            entry.tenant_id, entry.sku_id, entry.logical_quantity, entry.lot_quantity
        );
    }

    if summary.unbalanced > 0 {
        bail!("库存账本不平衡: {} 条", summary.unbalanced);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_paths_and_flags() {
        let parsed = CliArgs::parse(args(&["--skus", "s.csv", "--json-log"])).unwrap();
        assert_eq!(parsed.skus, Some(PathBuf::from("s.csv")));
        assert!(parsed.locations.is_none());
        assert!(parsed.json_log);
    }

    #[test]
    fn test_parse_rejects_missing_value_and_unknown_flag() {
        assert!(CliArgs::parse(args(&["--locations"])).is_err());
        assert!(CliArgs::parse(args(&["--verbose"])).is_err());
    }
}
