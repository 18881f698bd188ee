//! Container storage and retrieval across yard blocks.
//!
//! # Storage
//! A new container goes to the least utilized block (ties by block order),
//! on its lowest stack.
//!
//! # Retrieval
//! Containers above the target are relocated first, top down, each to the
//! lowest other stack of the same block, or of another block when the home
//! block has no room. Retrieval fails with [`PortError::YardFull`] before
//! moving anything if there is nowhere to put the blockers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::block::{SlotPosition, StackPosition, YardBlock};
use crate::error::{PortError, PortResult};
use crate::sim::SimTime;

/// Where a container was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLocation {
    pub block: String,
    pub slot: SlotPosition,
}

/// One reshuffle performed to free a target container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relocation {
    pub container_id: String,
    pub from_block: String,
    pub to: StoredLocation,
}

/// Outcome of a retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub container_id: String,
    pub block: String,
    /// Reshuffles needed, in execution order.
    pub relocations: Vec<Relocation>,
    /// Hours the container spent in the yard.
    pub dwell_hours: f64,
}

impl RetrievalReport {
    /// Crane moves: relocations plus the retrieval itself.
    pub fn moves(&self) -> usize {
        self.relocations.len() + 1
    }
}

/// Cumulative yard statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YardStats {
    pub stored: u64,
    pub retrieved: u64,
    pub relocations: u64,
    pub rejected: u64,
}

/// Owns every yard block.
#[derive(Debug, Clone, Default)]
pub struct YardManager {
    blocks: Vec<YardBlock>,
    home: HashMap<String, usize>,
    stored_at: HashMap<String, SimTime>,
    stats: YardStats,
}

impl YardManager {
    /// Creates a manager over the given blocks (ids must be unique).
    pub fn new(blocks: Vec<YardBlock>) -> PortResult<Self> {
        for (i, block) in blocks.iter().enumerate() {
            if blocks[..i].iter().any(|b| b.id() == block.id()) {
                return Err(PortError::config(
                    format!("yard_block[{}].id", block.id()),
                    "duplicate block id",
                ));
            }
        }
        Ok(Self {
            blocks,
            ..Default::default()
        })
    }

    pub fn blocks(&self) -> &[YardBlock] {
        &self.blocks
    }

    pub fn stats(&self) -> &YardStats {
        &self.stats
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(YardBlock::capacity).sum()
    }

    /// Stored containers.
    pub fn container_count(&self) -> usize {
        self.home.len()
    }

    /// Free slots.
    pub fn free_slots(&self) -> usize {
        self.capacity() - self.container_count()
    }

    /// Yard-wide `occupied / capacity`.
    pub fn utilization(&self) -> f64 {
        let capacity = self.capacity();
        if capacity == 0 {
            return 0.0;
        }
        self.container_count() as f64 / capacity as f64
    }

    pub fn contains(&self, container_id: &str) -> bool {
        self.home.contains_key(container_id)
    }

    /// Where a container sits.
    pub fn locate(&self, container_id: &str) -> Option<StoredLocation> {
        let &b = self.home.get(container_id)?;
        let block = &self.blocks[b];
        Some(StoredLocation {
            block: block.id().to_string(),
            slot: block.position(container_id)?,
        })
    }

    /// Number of containers that must be moved to reach `container_id`.
    pub fn blocking_count(&self, container_id: &str) -> PortResult<usize> {
        let &b = self
            .home
            .get(container_id)
            .ok_or_else(|| PortError::ContainerNotFound(container_id.to_string()))?;
        Ok(self.blocks[b].blocking_containers(container_id)?.len())
    }

    /// Stores a container.
    pub fn store(&mut self, container_id: &str, now: SimTime) -> PortResult<StoredLocation> {
        if self.home.contains_key(container_id) {
            return Err(PortError::config(
                format!("container[{container_id}]"),
                "already in yard",
            ));
        }
        let target = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_full())
            .min_by(|(i, a), (j, b)| {
                a.utilization()
                    .total_cmp(&b.utilization())
                    .then_with(|| i.cmp(j))
            })
            .map(|(i, _)| i);
        let Some(b) = target else {
            self.stats.rejected += 1;
            return Err(PortError::YardFull(format!(
                "no free slot for {container_id}"
            )));
        };

        let slot = self.place_in_block(b, container_id, None)?;
        self.stored_at.insert(container_id.to_string(), now);
        self.stats.stored += 1;
        trace!(container = container_id, block = self.blocks[b].id(), ?slot, "stored");
        Ok(StoredLocation {
            block: self.blocks[b].id().to_string(),
            slot,
        })
    }

    fn place_in_block(
        &mut self,
        b: usize,
        container_id: &str,
        exclude: Option<StackPosition>,
    ) -> PortResult<SlotPosition> {
        let block = &mut self.blocks[b];
        let stack = block
            .lowest_stack(exclude)
            .ok_or_else(|| PortError::YardFull(block.id().to_string()))?;
        let slot = block.place(container_id, stack)?;
        self.home.insert(container_id.to_string(), b);
        Ok(slot)
    }

    /// Retrieves a container, relocating whatever sits on top of it.
    pub fn retrieve(&mut self, container_id: &str, now: SimTime) -> PortResult<RetrievalReport> {
        let &b = self
            .home
            .get(container_id)
            .ok_or_else(|| PortError::ContainerNotFound(container_id.to_string()))?;
        let slot = self.blocks[b]
            .position(container_id)
            .ok_or_else(|| PortError::ContainerNotFound(container_id.to_string()))?;
        let target_stack = StackPosition {
            row: slot.row,
            bay: slot.bay,
        };
        let blockers = self.blocks[b].blocking_containers(container_id)?;

        // Room elsewhere: free slots minus what is left in the target stack.
        let target_room = (self.blocks[b].tiers() - self.blocks[b].stack_height(target_stack)?) as usize;
        if self.free_slots() - target_room < blockers.len() {
            return Err(PortError::YardFull(format!(
                "cannot relocate {} containers blocking {container_id}",
                blockers.len()
            )));
        }

        let from_block = self.blocks[b].id().to_string();
        let mut relocations = Vec::with_capacity(blockers.len());
        for blocker in blockers {
            self.blocks[b].remove_top(target_stack)?;
            self.home.remove(&blocker);
            let to = self.relocate(b, &blocker, target_stack)?;
            relocations.push(Relocation {
                container_id: blocker,
                from_block: from_block.clone(),
                to,
            });
        }

        self.blocks[b].remove_top(target_stack)?;
        self.home.remove(container_id);
        let stored = self.stored_at.remove(container_id).unwrap_or(now);
        self.stats.retrieved += 1;
        self.stats.relocations += relocations.len() as u64;
        if !relocations.is_empty() {
            debug!(container = container_id, relocations = relocations.len(), "retrieved with reshuffles");
        }

        Ok(RetrievalReport {
            container_id: container_id.to_string(),
            block: from_block,
            relocations,
            dwell_hours: now.since(stored),
        })
    }

    fn relocate(&mut self, home: usize, container_id: &str, avoid: StackPosition) -> PortResult<StoredLocation> {
        if self.blocks[home].lowest_stack(Some(avoid)).is_some() {
            let slot = self.place_in_block(home, container_id, Some(avoid))?;
            return Ok(StoredLocation {
                block: self.blocks[home].id().to_string(),
                slot,
            });
        }
        let other = (0..self.blocks.len())
            .filter(|&i| i != home && !self.blocks[i].is_full())
            .min_by(|&i, &j| {
                self.blocks[i]
                    .utilization()
                    .total_cmp(&self.blocks[j].utilization())
                    .then_with(|| i.cmp(&j))
            })
            .ok_or_else(|| PortError::YardFull(format!("no room to relocate {container_id}")))?;
        let slot = self.place_in_block(other, container_id, None)?;
        Ok(StoredLocation {
            block: self.blocks[other].id().to_string(),
            slot,
        })
    }

    /// Containers stored at or before `cutoff`, oldest first (ties by id).
    pub fn stored_before(&self, cutoff: SimTime) -> Vec<String> {
        let mut due: Vec<(&String, &SimTime)> = self
            .stored_at
            .iter()
            .filter(|(_, at)| **at <= cutoff)
            .collect();
        due.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        due.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Empties every block and clears statistics.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.clear();
        }
        self.home.clear();
        self.stored_at.clear();
        self.stats = YardStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yard(blocks: u32, rows: u32, bays: u32, tiers: u32) -> YardManager {
        YardManager::new(
            (0..blocks)
                .map(|i| YardBlock::new(format!("Y{i}"), rows, bays, tiers).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_store_balances_blocks() {
        let mut y = yard(2, 1, 2, 2);
        let a = y.store("C1", SimTime::ZERO).unwrap();
        let b = y.store("C2", SimTime::ZERO).unwrap();
        assert_eq!(a.block, "Y0");
        assert_eq!(b.block, "Y1");
        assert_eq!(y.container_count(), 2);
        assert!((y.utilization() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_retrieve_relocates_blockers_in_same_block() {
        let mut y = yard(1, 1, 2, 3);
        // Lowest-stack rule: C1→(0,0), C2→(0,1), C3→(0,0), C4→(0,1)
        for c in ["C1", "C2", "C3", "C4"] {
            y.store(c, SimTime(1.0)).unwrap();
        }
        assert_eq!(y.blocking_count("C1").unwrap(), 1);

        let report = y.retrieve("C1", SimTime(5.0)).unwrap();
        assert_eq!(report.relocations.len(), 1);
        assert_eq!(report.relocations[0].container_id, "C3");
        assert_eq!(report.relocations[0].to.slot.bay, 1);
        assert_eq!(report.moves(), 2);
        assert!((report.dwell_hours - 4.0).abs() < 1e-12);

        assert!(!y.contains("C1"));
        assert_eq!(y.locate("C3").unwrap().slot.tier, 2);
        assert_eq!(y.stats().relocations, 1);
        assert_eq!(y.stats().retrieved, 1);
    }

    #[test]
    fn test_relocation_spills_to_other_block() {
        let mut y = YardManager::new(vec![
            YardBlock::new("A", 1, 1, 3).unwrap(),
            YardBlock::new("B", 1, 1, 3).unwrap(),
        ])
        .unwrap();
        // A: C1, C3 (stores alternate between blocks)
        for c in ["C1", "C2", "C3"] {
            y.store(c, SimTime::ZERO).unwrap();
        }
        assert_eq!(y.locate("C3").unwrap().block, "A");
        let report = y.retrieve("C1", SimTime(1.0)).unwrap();
        assert_eq!(report.relocations[0].to.block, "B");
        assert_eq!(y.locate("C3").unwrap().block, "B");
    }

    #[test]
    fn test_retrieve_fails_without_room_and_changes_nothing() {
        let mut y = yard(1, 1, 1, 2);
        y.store("C1", SimTime::ZERO).unwrap();
        y.store("C2", SimTime::ZERO).unwrap();
        let err = y.retrieve("C1", SimTime(1.0)).unwrap_err();
        assert!(matches!(err, PortError::YardFull(_)));
        assert_eq!(y.container_count(), 2);
        assert_eq!(y.blocking_count("C1").unwrap(), 1);
    }

    #[test]
    fn test_full_yard_rejects_store() {
        let mut y = yard(1, 1, 1, 1);
        y.store("C1", SimTime::ZERO).unwrap();
        assert!(matches!(y.store("C2", SimTime::ZERO), Err(PortError::YardFull(_))));
        assert_eq!(y.stats().rejected, 1);
        assert!(matches!(
            y.retrieve("C9", SimTime::ZERO),
            Err(PortError::ContainerNotFound(_))
        ));
    }

    #[test]
    fn test_stored_before_orders_by_age() {
        let mut y = yard(1, 2, 2, 2);
        y.store("late", SimTime(10.0)).unwrap();
        y.store("b", SimTime(2.0)).unwrap();
        y.store("a", SimTime(2.0)).unwrap();
        assert_eq!(y.stored_before(SimTime(5.0)), vec!["a", "b"]);
        y.reset();
        assert_eq!(y.container_count(), 0);
    }
}
