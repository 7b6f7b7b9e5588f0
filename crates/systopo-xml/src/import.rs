//! Exchange document to topology

use std::collections::HashMap;
use std::path::Path;

use systopo_core::{
    AttributeCodec, BuiltinAttribute, Component, ComponentKey, ComponentType, DataPath,
    DataPathKey, DataPathType, NoCodec, PathOrientation, Topology,
};
use tracing::{debug, info, warn};

use crate::builtin::{decode_builtin, parse_attr, ATTRIBUTE_TAG};
use crate::config::XmlConfig;
use crate::details::read_details;
use crate::element::Element;
use crate::error::{Result, XmlError};
use crate::export::{COMPONENTS_TAG, DATA_PATHS_TAG, DATA_PATH_TAG};

/// Rebuilds a topology from an exchange document
///
/// Components are created in document order; data paths are resolved in a
/// second pass once every `addr` is known. Attributes that are not built-in
/// are offered to the codec, and dropped when it declines or fails.
pub struct XmlImporter<'a> {
    config: XmlConfig,
    codec: &'a dyn AttributeCodec,
}

impl Default for XmlImporter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlImporter<'static> {
    pub fn new() -> Self {
        Self {
            config: XmlConfig::default(),
            codec: &NoCodec,
        }
    }
}

/// Where an opaque attribute is being attached
#[derive(Clone, Copy)]
enum Owner {
    Component(ComponentKey),
    DataPath(DataPathKey),
}

impl<'a> XmlImporter<'a> {
    pub fn with_config(mut self, config: XmlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_codec<'b>(self, codec: &'b dyn AttributeCodec) -> XmlImporter<'b> {
        XmlImporter {
            config: self.config,
            codec,
        }
    }

    pub fn import_str(&self, xml: &str) -> Result<Topology> {
        self.import(&Element::parse(xml)?)
    }

    pub fn import_file(&self, path: &Path) -> Result<Topology> {
        let content = std::fs::read_to_string(path)?;
        let topology = self.import_str(&content)?;
        info!(path = %path.display(), components = topology.component_count(), "Loaded topology document");
        Ok(topology)
    }

    pub fn import(&self, document: &Element) -> Result<Topology> {
        if document.name != self.config.root_element {
            return Err(XmlError::Malformed(format!(
                "expected <{}> document, found <{}>",
                self.config.root_element, document.name
            )));
        }
        let components = document.find(COMPONENTS_TAG).ok_or_else(|| {
            XmlError::Malformed(format!("missing <{}> section", COMPONENTS_TAG))
        })?;
        let mut roots = components.elements();
        let root_element = roots
            .next()
            .ok_or_else(|| XmlError::Malformed("document holds no components".to_string()))?;
        if roots.next().is_some() {
            return Err(XmlError::Malformed(
                "document holds more than one root component".to_string(),
            ));
        }

        let mut topology = Topology::with_root(component_from_element(root_element)?);
        let mut addrs = HashMap::new();
        let root = topology.root();
        self.fill_component(&mut topology, root, root_element, &mut addrs)?;

        if let Some(section) = document.find(DATA_PATHS_TAG) {
            for element in section.elements() {
                self.import_data_path(&mut topology, element, &addrs)?;
            }
        }

        debug!(
            components = topology.component_count(),
            data_paths = topology.data_path_count(),
            "Imported topology"
        );
        Ok(topology)
    }

    /// Record `key`'s addr, decode its attributes, then build its children
    fn fill_component(
        &self,
        topology: &mut Topology,
        key: ComponentKey,
        element: &Element,
        addrs: &mut HashMap<String, ComponentKey>,
    ) -> Result<()> {
        if let Some(addr) = element.attr("addr") {
            if addrs.insert(addr.to_string(), key).is_some() {
                return Err(XmlError::Malformed(format!("duplicate addr {}", addr)));
            }
        }

        for child in element.elements() {
            if child.name == ATTRIBUTE_TAG {
                self.import_attribute(topology, Owner::Component(key), child)?;
            }
        }
        for child in element.elements() {
            if child.name != ATTRIBUTE_TAG {
                let child_key = topology.add_component(Some(key), component_from_element(child)?)?;
                self.fill_component(topology, child_key, child, addrs)?;
            }
        }
        Ok(())
    }

    fn import_data_path(
        &self,
        topology: &mut Topology,
        element: &Element,
        addrs: &HashMap<String, ComponentKey>,
    ) -> Result<()> {
        if element.name != DATA_PATH_TAG {
            return Err(XmlError::Malformed(format!(
                "unexpected <{}> in <{}>",
                element.name, DATA_PATHS_TAG
            )));
        }
        let resolve = |attr: &str| -> Result<ComponentKey> {
            let addr = element.required_attr(attr)?;
            addrs
                .get(addr)
                .copied()
                .ok_or_else(|| XmlError::UnresolvedReference(addr.to_string()))
        };
        let source = resolve("source")?;
        let target = resolve("target")?;

        let orientation = match element.required_attr("oriented")? {
            "1" => PathOrientation::Oriented,
            "0" => PathOrientation::Bidirectional,
            other => {
                return Err(XmlError::Malformed(format!(
                    "oriented must be 0 or 1, got '{}'",
                    other
                )))
            }
        };
        let code: u32 = parse_attr(element, "dp_type")?;
        let path_type = DataPathType::from_code(code)
            .ok_or_else(|| XmlError::Malformed(format!("unknown dp_type {}", code)))?;

        let path = DataPath::new(source, target, orientation, path_type)
            .with_metrics(parse_attr(element, "bw")?, parse_attr(element, "latency")?);
        let key = topology.create_data_path(path)?;
        for child in element.elements().filter(|e| e.name == ATTRIBUTE_TAG) {
            self.import_attribute(topology, Owner::DataPath(key), child)?;
        }
        Ok(())
    }

    fn import_attribute(&self, topology: &mut Topology, owner: Owner, element: &Element) -> Result<()> {
        let name = element.required_attr("name")?;

        if let Some(attribute) = BuiltinAttribute::from_name(name) {
            let value = decode_builtin(attribute, element)?;
            match owner {
                Owner::Component(key) => topology.component_mut(key)?.set_builtin(value),
                Owner::DataPath(key) => topology.data_path_mut(key)?.set_builtin(value),
            }
            return Ok(());
        }

        let fragment = element.to_xml(0)?;
        match self.codec.decode(name, &fragment) {
            Ok(Some(value)) => {
                let stored = match owner {
                    Owner::Component(key) => topology.component_mut(key)?.set_attribute(name, value),
                    Owner::DataPath(key) => topology.data_path_mut(key)?.set_attribute(name, value),
                };
                if let Err(e) = stored {
                    warn!(attribute = name, error = %e, "Decoded attribute rejected by store");
                }
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => {
                warn!(attribute = name, error = %e, "Attribute decoder failed, skipping attribute");
                return Ok(());
            }
        }

        let Owner::Component(key) = owner else {
            debug!(attribute = name, "Data path attribute not recognized, dropping");
            return Ok(());
        };
        match self.codec.decode_complex(name, &fragment, topology, key) {
            Ok(true) => {}
            Ok(false) => debug!(component = %key, attribute = name, "Attribute not recognized, dropping"),
            Err(e) => {
                warn!(component = %key, attribute = name, error = %e, "Attribute decoder failed, skipping attribute")
            }
        }
        Ok(())
    }
}

fn component_from_element(element: &Element) -> Result<Component> {
    let component_type: ComponentType = element
        .name
        .parse()
        .map_err(|e: systopo_core::UnknownComponentType| XmlError::UnknownComponentType(e.0))?;
    let id = parse_attr(element, "id")?;
    let name = element.attr("name").unwrap_or_default();

    let mut component = Component::new(id, name, component_type);
    component.set_details(read_details(element, component_type)?);
    Ok(component)
}
