// ==========================================
// 仓储货位与波次拣选系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 多步状态变更必须在单个事务内完成
// ==========================================

pub(crate) mod commitments;
pub mod error;
pub mod inventory_ledger;
pub mod pick_allocation;
pub mod rebalancing;
pub mod repositories;
pub mod route;
pub mod slotting;
pub mod wave_builder;

#[cfg(test)]
pub(crate) mod test_fixtures;

// 重导出核心引擎
pub use error::{EngineError, EngineResult};
pub use inventory_ledger::{
    InventoryLedger, PickReceipt, PutAwayReceipt, TransferReceipt, TransferRequest, TransferredLot,
};
pub use pick_allocation::{AllocatedLot, PickAllocation, PickAllocationEngine};
pub use rebalancing::{RebalanceSuggestion, RebalancingAdvisor};
pub use repositories::WarehouseRepositories;
pub use route::{NearestNeighborRoute, RouteOptimizer, RouteResult, RouteStop, RouteStrategy};
pub use slotting::{RankedCandidate, ScoreBreakdown, SlotStrategy, SlotSuggestion, SlottingEngine};
pub use wave_builder::{WaveBuildResult, WaveBuilder};
