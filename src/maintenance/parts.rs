//! Spare-part inventory with reorder-point replenishment.
//!
//! When a consumption leaves a part at or below its reorder point and no
//! order is outstanding, `reorder_quantity` units are ordered and arrive
//! `lead_time_hours` later.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::SparePartConfig;
use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// One inventory line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparePart {
    pub id: String,
    pub stock: u32,
    pub reorder_point: u32,
    pub reorder_quantity: u32,
    pub lead_time_hours: f64,
    pub unit_cost: f64,
    pub on_order: bool,
}

impl SparePart {
    pub fn from_config(config: &SparePartConfig) -> Self {
        Self {
            id: config.id.clone(),
            stock: config.stock,
            reorder_point: config.reorder_point,
            reorder_quantity: config.reorder_quantity,
            lead_time_hours: config.lead_time_hours,
            unit_cost: config.unit_cost,
            on_order: false,
        }
    }
}

/// A replenishment in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub part_id: String,
    pub quantity: u32,
    pub arrives_at: SimTime,
}

/// Spare parts on hand and on order.
#[derive(Debug, Clone, Default)]
pub struct PartsInventory {
    parts: BTreeMap<String, SparePart>,
    initial: BTreeMap<String, u32>,
    pending: Vec<PendingOrder>,
    orders_placed: u32,
}

impl PartsInventory {
    pub fn from_config(configs: &[SparePartConfig]) -> Self {
        let parts: BTreeMap<String, SparePart> = configs
            .iter()
            .map(|c| (c.id.clone(), SparePart::from_config(c)))
            .collect();
        let initial = parts.iter().map(|(id, p)| (id.clone(), p.stock)).collect();
        Self {
            parts,
            initial,
            pending: Vec::new(),
            orders_placed: 0,
        }
    }

    pub fn get(&self, id: &str) -> Option<&SparePart> {
        self.parts.get(id)
    }

    pub fn stock(&self, id: &str) -> u32 {
        self.parts.get(id).map_or(0, |p| p.stock)
    }

    /// Whether every line is in stock (> 0 and ≥ quantity).
    /// Unknown parts count as missing.
    pub fn has_all(&self, required: &BTreeMap<String, u32>) -> bool {
        required.iter().all(|(id, qty)| {
            self.parts
                .get(id)
                .is_some_and(|p| p.stock > 0 && p.stock >= *qty)
        })
    }

    /// Value of the required parts at unit cost.
    pub fn cost_of(&self, required: &BTreeMap<String, u32>) -> f64 {
        required
            .iter()
            .filter_map(|(id, qty)| self.parts.get(id).map(|p| p.unit_cost * *qty as f64))
            .sum()
    }

    /// Takes the parts out of stock, placing reorders where needed.
    /// Returns the parts cost. Nothing is taken if any line is short.
    pub fn consume(&mut self, required: &BTreeMap<String, u32>, now: SimTime) -> PortResult<f64> {
        if let Some((id, _)) = required.iter().find(|(id, _)| !self.parts.contains_key(*id)) {
            return Err(PortError::unknown("spare part", id.clone()));
        }
        for (id, qty) in required {
            let stock = self.stock(id);
            if stock == 0 || stock < *qty {
                return Err(PortError::ResourceUnsatisfiable {
                    pool: format!("part:{id}"),
                    requested: *qty,
                    capacity: stock,
                });
            }
        }

        let cost = self.cost_of(required);
        for (id, qty) in required {
            let Some(part) = self.parts.get_mut(id) else {
                continue;
            };
            part.stock -= *qty;
            if part.stock <= part.reorder_point && !part.on_order && part.reorder_quantity > 0 {
                part.on_order = true;
                self.orders_placed += 1;
                let arrives_at = now + part.lead_time_hours;
                debug!(part = %id, quantity = part.reorder_quantity, at = %arrives_at, "reorder placed");
                self.pending.push(PendingOrder {
                    part_id: id.clone(),
                    quantity: part.reorder_quantity,
                    arrives_at,
                });
            }
        }
        Ok(cost)
    }

    /// Books deliveries due by `now`. Returns the restocked part ids.
    pub fn receive_due(&mut self, now: SimTime) -> Vec<String> {
        let (due, later): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|o| o.arrives_at <= now);
        self.pending = later;
        let mut restocked = Vec::new();
        for order in due {
            if let Some(part) = self.parts.get_mut(&order.part_id) {
                part.stock += order.quantity;
                part.on_order = false;
                restocked.push(order.part_id);
            }
        }
        restocked
    }

    pub fn pending(&self) -> &[PendingOrder] {
        &self.pending
    }

    pub fn orders_placed(&self) -> u32 {
        self.orders_placed
    }

    /// Restores the configured stock and drops outstanding orders.
    pub fn reset(&mut self) {
        for (id, part) in self.parts.iter_mut() {
            part.stock = self.initial.get(id).copied().unwrap_or(0);
            part.on_order = false;
        }
        self.pending.clear();
        self.orders_placed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn need(parts: &[(&str, u32)]) -> BTreeMap<String, u32> {
        parts.iter().map(|(p, q)| (p.to_string(), *q)).collect()
    }

    fn inventory() -> PartsInventory {
        PartsInventory::from_config(&[
            SparePartConfig::new("filter_set", 2, 1, 5, 48.0, 120.0),
            SparePartConfig::new("sensor_pack", 0, 0, 3, 10.0, 300.0),
        ])
    }

    #[test]
    fn test_stock_checks() {
        let inv = inventory();
        assert!(inv.has_all(&need(&[("filter_set", 2)])));
        assert!(!inv.has_all(&need(&[("filter_set", 3)])));
        // Zero stock fails even for a zero quantity.
        assert!(!inv.has_all(&need(&[("sensor_pack", 0)])));
        assert!(!inv.has_all(&need(&[("unknown", 1)])));
        assert!(inv.has_all(&BTreeMap::new()));
    }

    #[test]
    fn test_consume_and_reorder() {
        let mut inv = inventory();
        let cost = inv.consume(&need(&[("filter_set", 1)]), SimTime(10.0)).unwrap();
        assert!((cost - 120.0).abs() < 1e-9);
        assert_eq!(inv.stock("filter_set"), 1);
        assert_eq!(inv.pending().len(), 1);
        assert_eq!(inv.pending()[0].arrives_at, SimTime(58.0));

        // No second order while one is outstanding.
        inv.consume(&need(&[("filter_set", 1)]), SimTime(11.0)).unwrap();
        assert_eq!(inv.orders_placed(), 1);
        assert!(inv.consume(&need(&[("filter_set", 1)]), SimTime(12.0)).is_err());

        assert!(inv.receive_due(SimTime(57.0)).is_empty());
        assert_eq!(inv.receive_due(SimTime(58.0)), vec!["filter_set".to_string()]);
        assert_eq!(inv.stock("filter_set"), 5);

        inv.reset();
        assert_eq!(inv.stock("filter_set"), 2);
    }
}
