//! Partition planning: deterministic assignment of user keys to workers.

use crate::error::ConfigurationError;

/// Work assignment held by one partition worker for the lifetime of a run:
/// slice `index` out of `count` modulo-disjoint slices of the key space.
/// Carries no data, only the predicate parameters the worker filters with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionDescriptor {
    count: u32,
    index: u32,
}

impl PartitionDescriptor {
    pub fn new(count: u32, index: u32) -> Result<Self, ConfigurationError> {
        if count == 0 {
            return Err(ConfigurationError::ZeroPartitions);
        }
        if index >= count {
            return Err(ConfigurationError::IndexOutOfRange { count, index });
        }
        Ok(Self { count, index })
    }

    pub const fn count(&self) -> u32 {
        self.count
    }

    pub const fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Display for PartitionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "partition {} of {}", self.index, self.count)
    }
}

/// Maps a user key to its owning partition index.
///
/// `rem_euclid` keeps negative keys inside `[0, count)`, matching the
/// normalized modulo the feed applies in SQL.
pub fn partition_of(user_id: i64, count: u32) -> u32 {
    let rem = user_id.rem_euclid(i64::from(count));
    u32::try_from(rem).unwrap_or_default()
}

/// Capability interface for partition planning strategies. The pipeline only
/// ever asks for a full set of descriptors up front; range- or hash-based
/// planners are swappable variants, not refinements of a base planner.
pub trait Planner {
    fn plan(&self, count: u32) -> Result<Vec<PartitionDescriptor>, ConfigurationError>;
}

/// Modulo-on-key planning: `count` descriptors covering indices `0..count`.
/// `count = 1` yields the single full-scan descriptor used by the sequential
/// reference path.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuloPlanner;

impl Planner for ModuloPlanner {
    fn plan(&self, count: u32) -> Result<Vec<PartitionDescriptor>, ConfigurationError> {
        (0..count)
            .map(|index| PartitionDescriptor::new(count, index))
            .collect()
    }
}
