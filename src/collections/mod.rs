//! The data-structure substrate shared by the search engines: an arena
//! node allocator and two intrusive indexed heaps built on top of it.

mod bin_heap;
mod min_max_heap;
mod node_pool;

pub use bin_heap::{BinHeap, HeapIndex, HeapOps, NO_INDEX};
pub use min_max_heap::MinMaxHeap;
pub use node_pool::{NodeId, NodePool};
