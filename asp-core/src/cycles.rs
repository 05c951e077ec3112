//! Cycle accountant
//!
//! Charges a fixed cost per width class for every instruction that mutates a
//! storage slot. Control flow, comparisons and output are free.

use serde::{Deserialize, Serialize};

use crate::types::WidthClass;

/// Cost table, one entry per width class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleCosts {
    pub w16: u64,
    pub w32: u64,
    pub w64: u64,
    pub w128: u64,
}

impl Default for CycleCosts {
    fn default() -> Self {
        Self {
            w16: 1,
            w32: 2,
            w64: 4,
            w128: 8,
        }
    }
}

impl CycleCosts {
    pub fn cost(&self, class: WidthClass) -> u64 {
        match class {
            WidthClass::W16 => self.w16,
            WidthClass::W32 => self.w32,
            WidthClass::W64 => self.w64,
            WidthClass::W128 => self.w128,
        }
    }

    /// Classes whose cost is zero
    pub fn zero_classes(&self) -> impl Iterator<Item = WidthClass> + '_ {
        WidthClass::ALL.into_iter().filter(|c| self.cost(*c) == 0)
    }
}

/// Running totals for one execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleCounter {
    costs: CycleCosts,
    per_class: [u64; WidthClass::COUNT],
    total: u64,
    instructions: u64,
}

impl CycleCounter {
    pub fn new(costs: CycleCosts) -> Self {
        Self {
            costs,
            ..Default::default()
        }
    }

    /// Charge one mutation of a slot in `class`; returns the amount charged
    pub fn charge(&mut self, class: WidthClass) -> u64 {
        let cost = self.costs.cost(class);
        self.per_class[class.index()] = self.per_class[class.index()].saturating_add(cost);
        self.total = self.total.saturating_add(cost);
        cost
    }

    /// Count one executed instruction
    pub fn tick(&mut self) {
        self.instructions += 1;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn class_total(&self, class: WidthClass) -> u64 {
        self.per_class[class.index()]
    }

    /// Per-class totals in ascending width order
    pub fn iter(&self) -> impl Iterator<Item = (WidthClass, u64)> + '_ {
        WidthClass::ALL.into_iter().map(|c| (c, self.class_total(c)))
    }

    pub fn costs(&self) -> &CycleCosts {
        &self.costs
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.costs);
    }
}
