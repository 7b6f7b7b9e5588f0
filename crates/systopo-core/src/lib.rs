//! systopo core - hardware topology tree, data-path graph, and attribute store
//!
//! This crate provides the in-memory model of a machine's hardware topology:
//! - Components (nodes, chips, cores, caches, memory, NUMA regions, ...) in a tree
//! - Data paths carrying bandwidth/latency between any two components
//! - Per-component attribute stores mixing built-in typed and opaque values
//! - The codec trait used to serialize opaque attributes
//!
//! Everything lives in a [`Topology`] arena and is addressed through
//! generation-checked keys. The model is single-writer: wrap a `Topology`
//! in a lock if several threads need to touch it.

pub mod arena;
pub mod attribute;
pub mod codec;
pub mod component;
pub mod consistency;
pub mod datapath;
pub mod topology;

pub use arena::{ComponentKey, DataPathKey};
pub use attribute::{
    is_builtin, AttributeError, AttributeStore, AttributeValue, BuiltinAttribute, BuiltinValue,
    FrequencySample, OpaqueValue,
};
pub use codec::{AttributeCodec, CallbackCodec, NoCodec};
pub use component::{
    ChipType, Component, ComponentDetails, ComponentType, SubdivisionType, UnknownComponentType,
};
pub use consistency::{ConsistencyReport, Inconsistency};
pub use datapath::{DataPath, DataPathType, Direction, PathOrientation};
pub use topology::{Topology, TopologyError, TopologySize};
