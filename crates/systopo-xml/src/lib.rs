//! systopo XML - exchange format for hardware topologies
//!
//! Writes a [`Topology`](systopo_core::Topology) subtree and its data paths
//! to a self-describing XML document and reads it back:
//!
//! ```
//! use systopo_core::{Component, Topology};
//! use systopo_xml::{XmlExporter, XmlImporter};
//!
//! let mut topo = Topology::new();
//! let root = topo.root();
//! topo.add_component(Some(root), Component::node(0)).unwrap();
//!
//! let xml = XmlExporter::new().export_to_string(&topo, root).unwrap();
//! let copy = XmlImporter::new().import_str(&xml).unwrap();
//! assert_eq!(copy.component_count(), 2);
//! ```
//!
//! Opaque attributes only survive when a matching
//! [`AttributeCodec`](systopo_core::AttributeCodec) is passed to both sides.

pub mod builtin;
pub mod config;
pub mod details;
pub mod element;
pub mod error;
pub mod export;
pub mod import;

pub use config::{ConfigError, XmlConfig};
pub use element::{Element, Node};
pub use error::{Result, XmlError};
pub use export::XmlExporter;
pub use import::XmlImporter;
