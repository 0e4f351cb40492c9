// ==========================================
// 仓储货位与波次拣选系统 - 仓储业务门面 API
// ==========================================
// 职责: 参数校验 → 装配配置 → 调用引擎（阻塞线程池）→ 错误转换
// 约束: 引擎同步执行，统一经 spawn_blocking 调度，避免阻塞异步运行时
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::RequestValidator;
use crate::config::{ConfigManager, EngineConfig, WarehouseConfigReader};
use crate::db::SharedConnection;
use crate::domain::stock::{PickRequest, PutAwayTask, ReconciliationEntry};
use crate::domain::types::WaveType;
use crate::domain::wave::{PickTask, Wave, WaveScope};
use crate::engine::{
    InventoryLedger, PickAllocation, PickAllocationEngine, PickReceipt, PutAwayReceipt,
    RebalanceSuggestion, RebalancingAdvisor, SlotSuggestion, SlottingEngine, TransferReceipt,
    TransferRequest, WarehouseRepositories, WaveBuildResult, WaveBuilder,
};
use crate::importer::{ImportSummary, MasterDataImporter};
use crate::perf::PerfGuard;

/// 上架结果（建议 + 提交回执）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutAwayOutcome {
    pub suggestion: SlotSuggestion,
    pub receipt: PutAwayReceipt,
}

/// 对账汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    pub unbalanced: usize,
    pub entries: Vec<ReconciliationEntry>,
}

// ==========================================
// WarehouseApi - 仓储业务门面
// ==========================================
pub struct WarehouseApi {
    conn: SharedConnection,
    config: Arc<dyn WarehouseConfigReader>,
    repos: WarehouseRepositories,
}

impl WarehouseApi {
    pub fn new(conn: SharedConnection, config: Arc<dyn WarehouseConfigReader>) -> Self {
        Self {
            repos: WarehouseRepositories::from_connection(conn.clone()),
            conn,
            config,
        }
    }

    /// 以 config_kv 表为配置源
    pub fn from_connection(conn: SharedConnection) -> ApiResult<Self> {
        let manager = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(Self::new(conn, Arc::new(manager)))
    }

    pub fn repositories(&self) -> &WarehouseRepositories {
        &self.repos
    }

    async fn engine_config(&self, tenant_id: Option<i64>) -> ApiResult<EngineConfig> {
        self.config
            .load_engine_config(tenant_id)
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))
    }

    // ==========================================
    // 上架
    // ==========================================

    /// 上架选位建议（只读）
    pub async fn suggest_slot(&self, task: PutAwayTask) -> ApiResult<SlotSuggestion> {
        let mut v = RequestValidator::new();
        v.put_away(&task);
        v.finish("suggest_slot")?;

        let cfg = self.engine_config(Some(task.tenant_id)).await?;
        let conn = self.conn.clone();
        run_blocking("api.suggest_slot", move || {
            Ok(SlottingEngine::new(conn, cfg.slotting).suggest(&task)?)
        })
        .await
    }

    /// 选位 + 提交（提交时重校验容量）
    #[instrument(skip(self, task), fields(sku_id = task.sku_id, tenant_id = task.tenant_id))]
    pub async fn put_away(&self, task: PutAwayTask, operator: String) -> ApiResult<PutAwayOutcome> {
        let mut v = RequestValidator::new();
        v.put_away(&task).operator(&operator);
        v.finish("put_away")?;

        let cfg = self.engine_config(Some(task.tenant_id)).await?;
        let conn = self.conn.clone();
        let outcome = run_blocking("api.put_away", move || {
            let ledger = InventoryLedger::with_slotting(conn.clone(), &cfg.slotting);
            let suggestion = SlottingEngine::new(conn, cfg.slotting).suggest(&task)?;
            let receipt = ledger.commit_put_away(&task, suggestion.location_id, &operator)?;
            Ok(PutAwayOutcome { suggestion, receipt })
        })
        .await?;

        info!(
            location_id = outcome.receipt.location_id,
            lot_id = outcome.receipt.lot_id,
            "上架完成"
        );
        Ok(outcome)
    }

    /// 按指定货位提交上架（重校验兼容性与容量）
    pub async fn commit_put_away(
        &self,
        task: PutAwayTask,
        location_id: i64,
        operator: String,
    ) -> ApiResult<PutAwayReceipt> {
        let mut v = RequestValidator::new();
        v.put_away(&task).positive_id("location_id", location_id).operator(&operator);
        v.finish("commit_put_away")?;

        let cfg = self.engine_config(Some(task.tenant_id)).await?;
        let conn = self.conn.clone();
        run_blocking("api.commit_put_away", move || {
            Ok(InventoryLedger::with_slotting(conn, &cfg.slotting).commit_put_away(&task, location_id, &operator)?)
        })
        .await
    }

    // ==========================================
    // 临时拣货
    // ==========================================

    /// FIFO 分配（只读）
    pub async fn allocate_pick(&self, request: PickRequest) -> ApiResult<PickAllocation> {
        let mut v = RequestValidator::new();
        v.pick_request(&request);
        v.finish("allocate_pick")?;

        let cfg = self.engine_config(Some(request.tenant_id)).await?;
        let conn = self.conn.clone();
        run_blocking("api.allocate_pick", move || {
            Ok(PickAllocationEngine::new(conn, cfg.allocation).allocate(request)?)
        })
        .await
    }

    /// 分配并执行拣货
    pub async fn pick(&self, request: PickRequest, operator: String) -> ApiResult<PickReceipt> {
        let mut v = RequestValidator::new();
        v.pick_request(&request).operator(&operator);
        v.finish("pick")?;

        let cfg = self.engine_config(Some(request.tenant_id)).await?;
        let conn = self.conn.clone();
        run_blocking("api.pick", move || {
            let allocation = PickAllocationEngine::new(conn.clone(), cfg.allocation).allocate(request)?;
            Ok(InventoryLedger::new(conn).execute_pick(&allocation, &operator)?)
        })
        .await
    }

    // ==========================================
    // 波次
    // ==========================================

    pub async fn build_wave(&self, wave_type: WaveType, scope: WaveScope) -> ApiResult<WaveBuildResult> {
        let mut v = RequestValidator::new();
        v.wave_scope(&scope);
        v.finish("build_wave")?;

        let builder = self.wave_builder(scope.tenant_id).await?;
        run_blocking("api.build_wave", move || Ok(builder.build_wave(wave_type, scope)?)).await
    }

    pub async fn start_wave(&self, wave_id: i64) -> ApiResult<Wave> {
        let builder = self.wave_builder(None).await?;
        run_blocking("api.start_wave", move || Ok(builder.start_wave(wave_id)?)).await
    }

    pub async fn confirm_pick_task(
        &self,
        task_id: i64,
        picked_qty: i64,
        operator: String,
    ) -> ApiResult<PickTask> {
        let mut v = RequestValidator::new();
        v.positive_id("task_id", task_id).picked_qty(picked_qty).operator(&operator);
        v.finish("confirm_pick_task")?;

        let builder = self.wave_builder(None).await?;
        run_blocking("api.confirm_pick_task", move || {
            Ok(builder.confirm_pick_task(task_id, picked_qty, &operator)?)
        })
        .await
    }

    pub async fn complete_wave(&self, wave_id: i64) -> ApiResult<Wave> {
        let builder = self.wave_builder(None).await?;
        run_blocking("api.complete_wave", move || Ok(builder.complete_wave(wave_id)?)).await
    }

    pub async fn cancel_wave(&self, wave_id: i64) -> ApiResult<Wave> {
        let builder = self.wave_builder(None).await?;
        run_blocking("api.cancel_wave", move || Ok(builder.cancel_wave(wave_id)?)).await
    }

    pub async fn list_wave_tasks(&self, wave_id: i64) -> ApiResult<Vec<PickTask>> {
        let repo = self.repos.wave_repo.clone();
        run_blocking("api.list_wave_tasks", move || Ok(repo.list_tasks(wave_id)?)).await
    }

    async fn wave_builder(&self, tenant_id: Option<i64>) -> ApiResult<WaveBuilder> {
        let cfg = self.engine_config(tenant_id).await?;
        Ok(WaveBuilder::new(self.conn.clone(), cfg.wave, cfg.allocation, cfg.route))
    }

    // ==========================================
    // 再平衡 / 调拨
    // ==========================================

    pub async fn rebalance_suggestions(&self) -> ApiResult<Vec<RebalanceSuggestion>> {
        let advisor = self.advisor().await?;
        run_blocking("api.rebalance_suggestions", move || Ok(advisor.suggest()?)).await
    }

    pub async fn execute_rebalance(
        &self,
        suggestion: RebalanceSuggestion,
        operator: String,
    ) -> ApiResult<TransferReceipt> {
        let mut v = RequestValidator::new();
        v.operator(&operator);
        v.finish("execute_rebalance")?;

        let advisor = self.advisor().await?;
        run_blocking("api.execute_rebalance", move || {
            Ok(advisor.execute(&suggestion, &operator)?)
        })
        .await
    }

    async fn advisor(&self) -> ApiResult<RebalancingAdvisor> {
        let cfg = self.engine_config(None).await?;
        Ok(RebalancingAdvisor::new(self.conn.clone(), cfg.slotting, cfg.rebalance))
    }

    pub async fn transfer(&self, request: TransferRequest, operator: String) -> ApiResult<TransferReceipt> {
        let mut v = RequestValidator::new();
        v.positive_id("sku_id", request.sku_id).operator(&operator);
        v.finish("transfer")?;

        let conn = self.conn.clone();
        run_blocking("api.transfer", move || {
            Ok(InventoryLedger::new(conn).transfer(&request, &operator)?)
        })
        .await
    }

    // ==========================================
    // 对账 / 主数据
    // ==========================================

    pub async fn reconcile_all(&self) -> ApiResult<ReconciliationSummary> {
        let conn = self.conn.clone();
        run_blocking("api.reconcile_all", move || {
            let entries = InventoryLedger::new(conn).reconcile_all()?;
            Ok(ReconciliationSummary {
                total: entries.len(),
                unbalanced: entries.iter().filter(|e| !e.is_balanced()).count(),
                entries,
            })
        })
        .await
    }

    pub async fn import_locations(&self, path: PathBuf) -> ApiResult<ImportSummary> {
        let conn = self.conn.clone();
        run_blocking("api.import_locations", move || {
            Ok(MasterDataImporter::new(conn).import_locations(&path)?)
        })
        .await
    }

    pub async fn import_skus(&self, path: PathBuf) -> ApiResult<ImportSummary> {
        let conn = self.conn.clone();
        run_blocking("api.import_skus", move || {
            Ok(MasterDataImporter::new(conn).import_skus(&path)?)
        })
        .await
    }
}

/// 在阻塞线程池执行同步引擎调用
async fn run_blocking<T, F>(op: &'static str, f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let _perf = PerfGuard::new(op);
        f()
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("任务执行失败: {}", e)))?
}
