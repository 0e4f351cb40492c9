use crate::domain::location::Location;
use crate::domain::sku::Sku;
use crate::domain::types::LocationType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 不兼容原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Incompatibility {
    HeavyUnitNeedsPalletOrGround,
    TemperatureControlRequired,
    TemperatureReadingMissing,
    TemperatureOutOfRange,
    FoodSegregation,
    HazmatNotAllowed,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Incompatibility::HeavyUnitNeedsPalletOrGround => "HEAVY_UNIT_NEEDS_PALLET_OR_GROUND",
            Incompatibility::TemperatureControlRequired => "TEMPERATURE_CONTROL_REQUIRED",
            Incompatibility::TemperatureReadingMissing => "TEMPERATURE_READING_MISSING",
            Incompatibility::TemperatureOutOfRange => "TEMPERATURE_OUT_OF_RANGE",
            Incompatibility::FoodSegregation => "FOOD_SEGREGATION",
            Incompatibility::HazmatNotAllowed => "HAZMAT_NOT_ALLOWED",
        };
        write!(f, "{}", s)
    }
}

/// 兼容性判定所需的上下文
pub struct CompatibilityRules<'a> {
    pub heavy_unit_weight_kg: f64,
    /// 当前存放食品类库存的货位
    pub food_locations: &'a HashSet<i64>,
}

impl<'a> CompatibilityRules<'a> {
    /// 依次检查: 重量 → 温控 → 食品隔离 → 危险品
    pub fn check(&self, sku: &Sku, location: &Location) -> Result<(), Incompatibility> {
        if sku.unit_weight_kg > self.heavy_unit_weight_kg
            && location.location_type != LocationType::Pallet
            && !location.is_ground_level()
        {
            return Err(Incompatibility::HeavyUnitNeedsPalletOrGround);
        }

        if sku.requires_temp_control {
            if !location.temperature_controlled {
                return Err(Incompatibility::TemperatureControlRequired);
            }
            match location.current_temperature {
                None => return Err(Incompatibility::TemperatureReadingMissing),
                Some(t) if !sku.accepts_temperature(t) => {
                    return Err(Incompatibility::TemperatureOutOfRange)
                }
                Some(_) => {}
            }
        }

        if sku.food_incompatible && self.food_locations.contains(&location.location_id) {
            return Err(Incompatibility::FoodSegregation);
        }

        if sku.hazardous && !location.hazmat_allowed {
            return Err(Incompatibility::HazmatNotAllowed);
        }

        Ok(())
    }
}
