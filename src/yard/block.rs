//! A single yard block: a `rows × bays × tiers` grid of container slots.
//!
//! Stacks obey gravity: tier `k` of a stack is occupied only if tiers
//! `0..k` are. Only the top container of a stack can be lifted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PortError, PortResult};

/// Position of a slot inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotPosition {
    pub row: u32,
    pub bay: u32,
    pub tier: u32,
}

/// Ground position of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackPosition {
    pub row: u32,
    pub bay: u32,
}

/// A block of stacked container slots.
#[derive(Debug, Clone)]
pub struct YardBlock {
    id: String,
    rows: u32,
    bays: u32,
    tiers: u32,
    /// Stacks indexed `row * bays + bay`, bottom container first.
    stacks: Vec<Vec<String>>,
    positions: HashMap<String, StackPosition>,
}

impl YardBlock {
    /// Creates an empty block.
    pub fn new(id: impl Into<String>, rows: u32, bays: u32, tiers: u32) -> PortResult<Self> {
        let id = id.into();
        if rows == 0 || bays == 0 || tiers == 0 {
            return Err(PortError::config(
                format!("yard_block[{id}]"),
                "rows, bays and tiers must be positive",
            ));
        }
        Ok(Self {
            id,
            rows,
            bays,
            tiers,
            stacks: vec![Vec::new(); (rows * bays) as usize],
            positions: HashMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tiers(&self) -> u32 {
        self.tiers
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        (self.rows * self.bays * self.tiers) as usize
    }

    /// Occupied slots.
    pub fn occupied(&self) -> usize {
        self.positions.len()
    }

    /// Free slots.
    pub fn free_slots(&self) -> usize {
        self.capacity() - self.occupied()
    }

    /// `occupied / capacity`.
    pub fn utilization(&self) -> f64 {
        self.occupied() as f64 / self.capacity() as f64
    }

    pub fn is_full(&self) -> bool {
        self.free_slots() == 0
    }

    pub fn contains(&self, container_id: &str) -> bool {
        self.positions.contains_key(container_id)
    }

    fn index(&self, stack: StackPosition) -> PortResult<usize> {
        if stack.row >= self.rows || stack.bay >= self.bays {
            return Err(PortError::unknown(
                "yard stack",
                format!("{}:{}/{}", self.id, stack.row, stack.bay),
            ));
        }
        Ok((stack.row * self.bays + stack.bay) as usize)
    }

    fn stack_at(&self, index: usize) -> StackPosition {
        let index = index as u32;
        StackPosition {
            row: index / self.bays,
            bay: index % self.bays,
        }
    }

    /// Number of containers in a stack.
    pub fn stack_height(&self, stack: StackPosition) -> PortResult<u32> {
        Ok(self.stacks[self.index(stack)?].len() as u32)
    }

    /// Top container of a stack.
    pub fn top(&self, stack: StackPosition) -> PortResult<Option<&str>> {
        Ok(self.stacks[self.index(stack)?].last().map(String::as_str))
    }

    /// Slot of a container.
    pub fn position(&self, container_id: &str) -> Option<SlotPosition> {
        let stack = *self.positions.get(container_id)?;
        let index = (stack.row * self.bays + stack.bay) as usize;
        let tier = self.stacks[index].iter().position(|c| c == container_id)? as u32;
        Some(SlotPosition {
            row: stack.row,
            bay: stack.bay,
            tier,
        })
    }

    /// Lowest stack that is not full, ties by (row, bay); `exclude` is skipped.
    pub fn lowest_stack(&self, exclude: Option<StackPosition>) -> Option<StackPosition> {
        self.stacks
            .iter()
            .enumerate()
            .filter(|(_, s)| (s.len() as u32) < self.tiers)
            .map(|(i, s)| (s.len(), self.stack_at(i)))
            .filter(|(_, pos)| Some(*pos) != exclude)
            .min()
            .map(|(_, pos)| pos)
    }

    /// Places a container on top of a stack.
    pub fn place(&mut self, container_id: &str, stack: StackPosition) -> PortResult<SlotPosition> {
        if self.positions.contains_key(container_id) {
            return Err(PortError::config(
                format!("container[{container_id}]"),
                "already stored in block",
            ));
        }
        let index = self.index(stack)?;
        let tiers = self.tiers;
        let column = &mut self.stacks[index];
        if column.len() as u32 >= tiers {
            return Err(PortError::YardFull(format!(
                "{} stack {}/{}",
                self.id, stack.row, stack.bay
            )));
        }
        column.push(container_id.to_string());
        let tier = column.len() as u32 - 1;
        self.positions.insert(container_id.to_string(), stack);
        Ok(SlotPosition {
            row: stack.row,
            bay: stack.bay,
            tier,
        })
    }

    /// Lifts the top container of a stack.
    pub fn remove_top(&mut self, stack: StackPosition) -> PortResult<Option<String>> {
        let index = self.index(stack)?;
        let top = self.stacks[index].pop();
        if let Some(id) = &top {
            self.positions.remove(id);
        }
        Ok(top)
    }

    /// Containers stacked above `container_id`, top first.
    pub fn blocking_containers(&self, container_id: &str) -> PortResult<Vec<String>> {
        let slot = self
            .position(container_id)
            .ok_or_else(|| PortError::ContainerNotFound(container_id.to_string()))?;
        let stack = &self.stacks[(slot.row * self.bays + slot.bay) as usize];
        Ok(stack[slot.tier as usize + 1..].iter().rev().cloned().collect())
    }

    /// Every stored container id.
    pub fn containers(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    /// Empties the block.
    pub fn clear(&mut self) {
        for stack in &mut self.stacks {
            stack.clear();
        }
        self.positions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: u32, bay: u32) -> StackPosition {
        StackPosition { row, bay }
    }

    #[test]
    fn test_gravity_and_capacity() {
        let mut block = YardBlock::new("A", 2, 2, 3).unwrap();
        assert_eq!(block.capacity(), 12);

        let s1 = block.place("C1", pos(0, 1)).unwrap();
        let s2 = block.place("C2", pos(0, 1)).unwrap();
        assert_eq!(s1.tier, 0);
        assert_eq!(s2.tier, 1);
        block.place("C3", pos(0, 1)).unwrap();
        let err = block.place("C4", pos(0, 1)).unwrap_err();
        assert!(matches!(err, PortError::YardFull(_)));

        assert_eq!(block.occupied(), 3);
        assert!((block.utilization() - 0.25).abs() < 1e-12);
        assert_eq!(block.stack_height(pos(0, 1)).unwrap(), 3);
        assert_eq!(block.top(pos(0, 1)).unwrap(), Some("C3"));
    }

    #[test]
    fn test_blocking_containers_top_first() {
        let mut block = YardBlock::new("A", 1, 1, 4).unwrap();
        for c in ["C1", "C2", "C3", "C4"] {
            block.place(c, pos(0, 0)).unwrap();
        }
        assert_eq!(block.blocking_containers("C2").unwrap(), vec!["C4", "C3"]);
        assert!(block.blocking_containers("C4").unwrap().is_empty());
        assert!(matches!(
            block.blocking_containers("C9"),
            Err(PortError::ContainerNotFound(_))
        ));
    }

    #[test]
    fn test_lowest_stack_prefers_short_then_order() {
        let mut block = YardBlock::new("A", 1, 3, 2).unwrap();
        block.place("C1", pos(0, 0)).unwrap();
        assert_eq!(block.lowest_stack(None), Some(pos(0, 1)));
        assert_eq!(block.lowest_stack(Some(pos(0, 1))), Some(pos(0, 2)));

        block.place("C2", pos(0, 1)).unwrap();
        block.place("C3", pos(0, 2)).unwrap();
        block.place("C4", pos(0, 0)).unwrap();
        assert_eq!(block.lowest_stack(None), Some(pos(0, 1)));
    }

    #[test]
    fn test_remove_top_and_positions() {
        let mut block = YardBlock::new("A", 2, 2, 2).unwrap();
        block.place("C1", pos(1, 1)).unwrap();
        block.place("C2", pos(1, 1)).unwrap();
        assert_eq!(block.position("C2"), Some(SlotPosition { row: 1, bay: 1, tier: 1 }));
        assert_eq!(block.remove_top(pos(1, 1)).unwrap().as_deref(), Some("C2"));
        assert!(!block.contains("C2"));
        assert!(block.position("C2").is_none());
        assert!(block.stack_height(pos(5, 0)).is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(YardBlock::new("bad", 0, 4, 4).is_err());
    }
}
