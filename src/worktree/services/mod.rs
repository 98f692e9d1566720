//! Services coordinating shared slot pool access.

mod allocator;

pub use allocator::WorktreeSlotAllocator;
