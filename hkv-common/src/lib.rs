// hkv-common - Shared reply and cluster types for HybridKV clients
//
// This crate defines what a node says back (values, error replies) and how
// keys map onto cluster slots.

pub mod node;
pub mod slot;
pub mod value;

// Re-export for convenience
pub use node::*;
pub use slot::*;
pub use value::*;
