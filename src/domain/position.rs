//! Open lots and the slot arena that owns them.
//!
//! Positions are addressed by [`PositionId`] handles. Removing a position
//! frees its slot and bumps the slot generation, so a handle taken earlier in
//! the same bar can never resolve to a lot opened later into the same slot.

use std::collections::BTreeMap;

use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionId {
    slot: usize,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub price: f64,
    pub quantity: u64,
    pub purchase_date: NaiveDate,
    /// Monotonic opening sequence, used to order snapshots.
    pub seq: u64,
}

/// Settlement state of an open lot relative to the bar being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotState {
    /// Bought on the current bar; cannot be sold until the next one.
    Locked,
    Eligible,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.price * self.quantity as f64
    }

    pub fn market_value(&self, price: f64) -> f64 {
        price * self.quantity as f64
    }

    /// (price - entry) / entry; zero for a degenerate entry price.
    pub fn return_at(&self, price: f64) -> f64 {
        if self.price > 0.0 {
            (price - self.price) / self.price
        } else {
            0.0
        }
    }

    pub fn state_on(&self, date: NaiveDate) -> LotState {
        if self.purchase_date == date {
            LotState::Locked
        } else {
            LotState::Eligible
        }
    }

    pub fn is_eligible_on(&self, date: NaiveDate) -> bool {
        self.state_on(date) == LotState::Eligible
    }
}

/// A lot that has been fully closed, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLot {
    pub quantity: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub stopped_out: bool,
}

impl ClosedLot {
    /// Price PnL before fees.
    pub fn gross_pnl(&self) -> f64 {
        (self.exit_price - self.entry_price) * self.quantity as f64
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    position: Option<Position>,
}

#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    slots: Vec<Slot>,
    free: Vec<usize>,
    /// Opening sequence to slot, for the open lots only.
    order: BTreeMap<u64, usize>,
    next_seq: u64,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, price: f64, quantity: u64, purchase_date: NaiveDate) -> PositionId {
        let position = Position {
            price,
            quantity,
            purchase_date,
            seq: self.next_seq,
        };
        let seq = self.next_seq;
        self.next_seq += 1;

        let id = match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot];
                entry.position = Some(position);
                PositionId {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    position: Some(position),
                });
                PositionId {
                    slot: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.order.insert(seq, id.slot);
        id
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.slots
            .get(id.slot)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.position.as_ref())
    }

    /// Removes the lot; stale or already-closed handles return `None`.
    pub fn close(&mut self, id: PositionId) -> Option<Position> {
        let slot = self.slots.get_mut(id.slot)?;
        if slot.generation != id.generation {
            return None;
        }
        let position = slot.position.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.order.remove(&position.seq);
        Some(position)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Open lots in opening order.
    pub fn iter(&self) -> impl Iterator<Item = (PositionId, &Position)> {
        self.order.values().filter_map(move |&slot| {
            let s = self.slots.get(slot)?;
            let position = s.position.as_ref()?;
            Some((
                PositionId {
                    slot,
                    generation: s.generation,
                },
                position,
            ))
        })
    }

    pub fn snapshot(&self) -> Vec<Position> {
        self.iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn lowest_entry(&self) -> Option<f64> {
        self.iter().map(|(_, p)| p.price).reduce(f64::min)
    }

    pub fn total_cost_basis(&self) -> f64 {
        self.iter().map(|(_, p)| p.cost_basis()).sum()
    }
}
