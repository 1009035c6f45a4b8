//! Sharing one structured interface between several users.
//!
//! An interface describes its fields once through [`Layout::FIELDS`], each
//! tagged with a [`Direction`]. Fan-in fields travel from the selected leaf
//! to the root; fan-out fields are copied from the root to every leaf.

use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    FanIn,
    FanOut,
}

pub trait Layout {
    type Field: Copy + 'static;

    const FIELDS: &'static [(Self::Field, Direction)];

    fn get(&self, field: Self::Field) -> u64;
    fn set(&mut self, field: Self::Field, value: u64);
}

#[derive(Debug, Clone)]
pub struct Multiplexer<T> {
    select: usize,
    leaves: Vec<T>,
}

impl<T: Layout> Multiplexer<T> {
    pub fn new(leaves: Vec<T>) -> Self {
        Self { select: 0, leaves }
    }

    pub fn select(&self) -> usize {
        self.select
    }

    pub fn set_select(&mut self, select: usize) -> SimResult<()> {
        if select >= self.leaves.len() {
            return Err(SimError::SelectOutOfRange {
                select,
                leaves: self.leaves.len(),
            });
        }
        self.select = select;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn leaf(&self, index: usize) -> Option<&T> {
        self.leaves.get(index)
    }

    pub fn leaf_mut(&mut self, index: usize) -> Option<&mut T> {
        self.leaves.get_mut(index)
    }

    /// Routes the selected leaf's fan-in fields to `root`.
    pub fn fan_in(&self, root: &mut T) -> SimResult<()> {
        let leaf = self.leaves.get(self.select).ok_or(SimError::SelectOutOfRange {
            select: self.select,
            leaves: self.leaves.len(),
        })?;
        for &(field, dir) in T::FIELDS {
            if dir == Direction::FanIn {
                root.set(field, leaf.get(field));
            }
        }
        Ok(())
    }

    /// Broadcasts `root`'s fan-out fields to every leaf.
    pub fn fan_out(&mut self, root: &T) {
        for leaf in &mut self.leaves {
            for &(field, dir) in T::FIELDS {
                if dir == Direction::FanOut {
                    leaf.set(field, root.get(field));
                }
            }
        }
    }
}
