//! Allocation ledger.
//!
//! Counts every heap block added to the policy graph so the serializer can
//! size its relocatable buffer without walking the graph first. The count only
//! grows during a compilation.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AllocationLedger {
    blocks: u64,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one new heap block.
    pub fn note_allocation(&mut self) {
        self.blocks += 1;
    }

    /// Records `blocks` new heap blocks.
    pub fn note_allocations(&mut self, blocks: u64) {
        self.blocks += blocks;
    }

    pub fn count(&self) -> u64 {
        self.blocks
    }
}
