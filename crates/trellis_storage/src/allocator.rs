//! Node lifecycle management with generational indices.
//!
//! The `NodeAllocator` hands out node ids and tracks generations so that
//! references to deleted nodes are detected instead of silently resolving
//! to whatever reused the slot.

// Allow u64 to usize casts - we target 64-bit systems
#![allow(clippy::cast_possible_truncation)]

use im::Vector;
use trellis_foundation::{Error, NodeId, Result};

/// Manages node lifecycle and generation tracking.
///
/// Slots are reused from a free list when available. Deleting a node bumps
/// its generation. Backed by persistent vectors so cloning is O(1).
#[derive(Debug, Clone, Default)]
pub struct NodeAllocator {
    /// Generation counter for each slot.
    /// Even generations are free, odd generations are alive.
    generations: Vector<u32>,
    /// Free list of slots available for reuse.
    free_list: Vector<u64>,
    /// Count of live nodes.
    live_count: usize,
}

impl NodeAllocator {
    /// Creates a new empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new node id.
    pub fn allocate(&mut self) -> NodeId {
        self.live_count += 1;

        if let Some(index) = self.free_list.pop_back() {
            let idx = index as usize;
            // Was even/free, now odd/alive
            let generation = self.generations[idx] + 1;
            self.generations.set(idx, generation);
            NodeId::new(index, generation)
        } else {
            let index = self.generations.len() as u64;
            // New nodes start at generation 1 (odd = alive)
            self.generations.push_back(1);
            NodeId::new(index, 1)
        }
    }

    /// Releases a node id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is stale or already released.
    pub fn release(&mut self, id: NodeId) -> Result<()> {
        self.validate(id)?;

        let idx = id.index as usize;
        self.generations.set(idx, self.generations[idx] + 1);
        self.free_list.push_back(id.index);
        self.live_count -= 1;

        Ok(())
    }

    /// Checks if a node id is live.
    #[must_use]
    pub fn exists(&self, id: NodeId) -> bool {
        self.generations
            .get(id.index as usize)
            .is_some_and(|&generation| generation == id.generation && generation % 2 == 1)
    }

    /// Validates that a node id is live.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if the slot never existed or is free, and
    /// `StaleNode` if the slot has been reused.
    pub fn validate(&self, id: NodeId) -> Result<()> {
        let Some(&current_gen) = self.generations.get(id.index as usize) else {
            return Err(Error::node_not_found(id));
        };

        if current_gen != id.generation {
            return Err(Error::stale_node(id));
        }

        if current_gen % 2 == 0 {
            return Err(Error::node_not_found(id));
        }

        Ok(())
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Returns true if no nodes are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }
}
