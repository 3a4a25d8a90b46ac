pub mod bitset;
pub mod geometry;
pub mod id_registry;
pub mod subdiv_id_registry;

pub use bitset::HierarchicalBitset;
pub use id_registry::{Id, IdOwner, IdRefCount, IdRegistry, IdSet};
pub use subdiv_id_registry::{MaybeNewId, SubdivIdRegistry};

use ahash::AHashMap;
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;

// Re-exports.
pub use approx;
pub use glam;
pub use static_assertions;
