// ==========================================
// 仓储货位与波次拣选系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod location;
pub mod movement;
pub mod order;
pub mod sku;
pub mod stock;
pub mod types;
pub mod unit_load;
pub mod wave;

// 重导出核心类型
pub use location::{Location, LocationCapacity};
pub use movement::{Movement, NewMovement};
pub use order::{EligibleOrder, NewOrder, NewOrderLine, Order, OrderLine};
pub use sku::Sku;
pub use stock::{
    LogicalStock, NewOwnershipLot, OwnershipLot, PhysicalStock, PickRequest, PutAwayTask,
    ReconciliationEntry,
};
pub use types::{
    LocationType, LotStatus, MovementType, OrderStatus, PickTaskStatus, UnitLoadStatus,
    VelocityClass, WaveStatus, WaveType,
};
pub use unit_load::{UnitLoad, UnitLoadContent, UnitLoadSource};
pub use wave::{
    PickTask, PlannedPickTask, UnfulfillableLine, UnfulfillableReason, Wave, WaveScope,
};
