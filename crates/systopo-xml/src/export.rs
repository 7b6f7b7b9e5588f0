//! Topology to exchange document

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::path::Path;

use systopo_core::{
    AttributeCodec, AttributeStore, AttributeValue, ComponentKey, DataPathKey, NoCodec,
    OpaqueValue, PathOrientation, Topology,
};
use tracing::{debug, info, warn};

use crate::builtin::{encode_builtin, ATTRIBUTE_TAG};
use crate::config::XmlConfig;
use crate::details::write_details;
use crate::element::{Element, MAX_DEPTH};
use crate::error::{Result, XmlError};

pub const COMPONENTS_TAG: &str = "components";
pub const DATA_PATHS_TAG: &str = "data-paths";
pub const DATA_PATH_TAG: &str = "datapath";

// Document root, the components section and one attribute element
// below the deepest component.
const ENVELOPE_DEPTH: usize = 3;

/// Writes a component subtree and the data paths between its members
///
/// Built-in attributes are always written natively. Opaque attributes go
/// through the codec, first as a plain value, then as an XML fragment; an
/// attribute neither call can represent is omitted.
pub struct XmlExporter<'a> {
    config: XmlConfig,
    codec: &'a dyn AttributeCodec,
}

impl Default for XmlExporter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlExporter<'static> {
    pub fn new() -> Self {
        Self {
            config: XmlConfig::default(),
            codec: &NoCodec,
        }
    }
}

impl<'a> XmlExporter<'a> {
    pub fn with_config(mut self, config: XmlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_codec<'b>(self, codec: &'b dyn AttributeCodec) -> XmlExporter<'b> {
        XmlExporter {
            config: self.config,
            codec,
        }
    }

    pub fn config(&self) -> &XmlConfig {
        &self.config
    }

    /// Build the document tree for the subtree rooted at `key`
    ///
    /// Subtrees too deep to be read back are refused with `TooDeep`.
    pub fn export(&self, topology: &Topology, key: ComponentKey) -> Result<Element> {
        let levels = topology.subtree_depth(key)? + 1;
        if levels + ENVELOPE_DEPTH > MAX_DEPTH {
            warn!(root = %key, levels, "Subtree too deep to export");
            return Err(XmlError::TooDeep(MAX_DEPTH));
        }

        let mut addrs = HashMap::new();
        let mut components = Element::new(COMPONENTS_TAG);
        components.push_child(self.component_element(topology, key, &mut addrs)?);

        let mut document = Element::new(self.config.root_element.as_str());
        document.push_child(components);
        if self.config.include_data_paths {
            document.push_child(self.data_paths_element(topology, &addrs)?);
        }

        debug!(root = %key, components = addrs.len(), "Exported topology");
        Ok(document)
    }

    /// Serialize the subtree rooted at `key` as a complete document
    pub fn export_to_string(&self, topology: &Topology, key: ComponentKey) -> Result<String> {
        self.export(topology, key)?
            .to_document(self.config.indent, self.config.declaration)
    }

    /// Write the subtree rooted at `key` to `path`
    ///
    /// Nothing is written unless the whole document could be built.
    pub fn export_to_file(&self, topology: &Topology, key: ComponentKey, path: &Path) -> Result<()> {
        let content = self.export_to_string(topology, key)?;
        std::fs::write(path, content)?;
        info!(path = %path.display(), "Wrote topology document");
        Ok(())
    }

    fn component_element(
        &self,
        topology: &Topology,
        key: ComponentKey,
        addrs: &mut HashMap<ComponentKey, usize>,
    ) -> Result<Element> {
        let component = topology.component(key)?;
        let addr = addrs.len();
        addrs.insert(key, addr);

        let mut element = Element::new(component.component_type_str())
            .with_attr("id", component.id())
            .with_attr("name", component.name())
            .with_attr("addr", addr);
        write_details(&mut element, component.details());
        for attribute in self.attribute_elements(component.attributes(), &key) {
            element.push_child(attribute);
        }
        for child in component.children() {
            element.push_child(self.component_element(topology, *child, addrs)?);
        }
        Ok(element)
    }

    /// Each distinct path touching the exported subtree, in pre-order of first sighting
    fn data_paths_element(
        &self,
        topology: &Topology,
        addrs: &HashMap<ComponentKey, usize>,
    ) -> Result<Element> {
        let mut order: Vec<(ComponentKey, usize)> = addrs.iter().map(|(k, a)| (*k, *a)).collect();
        order.sort_by_key(|(_, addr)| *addr);

        let mut seen: HashSet<DataPathKey> = HashSet::new();
        let mut section = Element::new(DATA_PATHS_TAG);
        for (key, _) in order {
            let component = topology.component(key)?;
            for path in component
                .outgoing_data_paths()
                .iter()
                .chain(component.incoming_data_paths())
            {
                if !seen.insert(*path) {
                    continue;
                }
                let dp = topology.data_path(*path)?;
                let (Some(source), Some(target)) = (addrs.get(&dp.source()), addrs.get(&dp.target()))
                else {
                    warn!(path = %path, "Data path leaves the exported subtree, skipping");
                    continue;
                };

                let oriented = match dp.orientation() {
                    PathOrientation::Oriented => 1,
                    PathOrientation::Bidirectional => 0,
                };
                let mut element = Element::new(DATA_PATH_TAG)
                    .with_attr("source", source)
                    .with_attr("target", target)
                    .with_attr("oriented", oriented)
                    .with_attr("dp_type", dp.path_type().code())
                    .with_attr("bw", dp.bandwidth())
                    .with_attr("latency", dp.latency());
                for attribute in self.attribute_elements(dp.attributes(), path) {
                    element.push_child(attribute);
                }
                section.push_child(element);
            }
        }
        Ok(section)
    }

    fn attribute_elements(&self, store: &AttributeStore, owner: &dyn Display) -> Vec<Element> {
        store
            .iter()
            .filter_map(|(name, value)| match value {
                AttributeValue::Builtin(builtin) => Some(encode_builtin(builtin)),
                AttributeValue::Opaque(opaque) => self.encode_opaque(name, opaque, owner),
            })
            .collect()
    }

    fn encode_opaque(&self, name: &str, value: &OpaqueValue, owner: &dyn Display) -> Option<Element> {
        match self.codec.encode(name, value) {
            Ok(Some(text)) => {
                return Some(
                    Element::new(ATTRIBUTE_TAG)
                        .with_attr("name", name)
                        .with_attr("value", text),
                )
            }
            Ok(None) => {}
            Err(e) => {
                warn!(owner = %owner, attribute = name, error = %e, "Attribute encoder failed, skipping attribute");
                return None;
            }
        }

        match self.codec.encode_complex(name, value) {
            Ok(Some(fragment)) => match Element::parse_fragment(&fragment) {
                Ok(nodes) => {
                    let mut element = Element::new(ATTRIBUTE_TAG).with_attr("name", name);
                    element.children = nodes;
                    Some(element)
                }
                Err(e) => {
                    warn!(owner = %owner, attribute = name, error = %e, "Attribute encoder returned invalid XML, skipping attribute");
                    None
                }
            },
            Ok(None) => {
                debug!(owner = %owner, attribute = name, "No encoding for opaque attribute, omitting");
                None
            }
            Err(e) => {
                warn!(owner = %owner, attribute = name, error = %e, "Attribute encoder failed, skipping attribute");
                None
            }
        }
    }
}
