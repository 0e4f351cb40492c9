// ==========================================
// 仓储货位与波次拣选系统 - SKU 领域模型
// ==========================================
// 用途: 商品目录实体（跨租户共享，不可变）
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Sku - 商品主数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sku {
    // ===== 主键 =====
    pub sku_id: i64,
    pub code: String, // 唯一编码
    pub description: Option<String>,

    // ===== 物理属性（单件） =====
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
    pub unit_weight_kg: f64,
    pub unit_volume: f64,

    // ===== 存储约束 =====
    pub hazardous: bool,
    pub fragile: bool,
    pub requires_temp_control: bool,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub food_category: bool,     // 食品类
    pub food_incompatible: bool, // 不可与食品类同储
}

impl Sku {
    /// 温度读数是否落在 SKU 允许区间内（未配置的一端视为不限）
    pub fn accepts_temperature(&self, reading: f64) -> bool {
        let above_min = self.temp_min.map_or(true, |min| reading >= min);
        let below_max = self.temp_max.map_or(true, |max| reading <= max);
        above_min && below_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chilled_sku() -> Sku {
        Sku {
            sku_id: 1,
            code: "CHILL-01".to_string(),
            description: None,
            length_cm: 10.0,
            width_cm: 10.0,
            height_cm: 10.0,
            unit_weight_kg: 1.0,
            unit_volume: 1.0,
            hazardous: false,
            fragile: false,
            requires_temp_control: true,
            temp_min: Some(2.0),
            temp_max: Some(8.0),
            food_category: true,
            food_incompatible: false,
        }
    }

    #[test]
    fn test_accepts_temperature_bounds_inclusive() {
        let sku = chilled_sku();
        assert!(sku.accepts_temperature(2.0));
        assert!(sku.accepts_temperature(8.0));
        assert!(!sku.accepts_temperature(8.5));
        assert!(!sku.accepts_temperature(-1.0));
    }
}
