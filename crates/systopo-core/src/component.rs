//! Component types: the nodes of the hardware topology tree

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::arena::{ComponentKey, DataPathKey};
use crate::attribute::{
    AttributeError, AttributeStore, AttributeValue, BuiltinAttribute, BuiltinValue,
    FrequencySample, OpaqueValue,
};

/// Descriptive type tag of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    None,
    Thread,
    Core,
    Cache,
    Subdivision,
    Numa,
    Chip,
    Memory,
    Storage,
    Node,
    Topology,
}

impl ComponentType {
    pub const ALL: [ComponentType; 11] = [
        ComponentType::None,
        ComponentType::Thread,
        ComponentType::Core,
        ComponentType::Cache,
        ComponentType::Subdivision,
        ComponentType::Numa,
        ComponentType::Chip,
        ComponentType::Memory,
        ComponentType::Storage,
        ComponentType::Node,
        ComponentType::Topology,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Thread => "HW_thread",
            Self::Core => "Core",
            Self::Cache => "Cache",
            Self::Subdivision => "Subdivision",
            Self::Numa => "NUMA",
            Self::Chip => "Chip",
            Self::Memory => "Memory",
            Self::Storage => "Storage",
            Self::Node => "Node",
            Self::Topology => "Topology",
        }
    }

    /// Numa regions are a specialised subdivision
    pub fn is_subdivision(self) -> bool {
        matches!(self, Self::Subdivision | Self::Numa)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown component type '{0}'")]
pub struct UnknownComponentType(pub String);

impl FromStr for ComponentType {
    type Err = UnknownComponentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownComponentType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChipType {
    None,
    #[default]
    Cpu,
    CpuSocket,
    Gpu,
}

impl ChipType {
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Cpu => 1,
            Self::CpuSocket => 2,
            Self::Gpu => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Cpu),
            2 => Some(Self::CpuSocket),
            3 => Some(Self::Gpu),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubdivisionType {
    #[default]
    None,
    GpuSm,
}

impl SubdivisionType {
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::GpuSm => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::GpuSm),
            _ => None,
        }
    }
}

/// Type-specific data carried by some component kinds
///
/// Sizes are in bytes, `-1` meaning unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentDetails {
    Generic,
    Chip {
        chip_type: ChipType,
        vendor: String,
        model: String,
    },
    Cache {
        level: i32,
        cache_name: String,
        size: i64,
        associativity: i32,
        line_size: i32,
    },
    Memory {
        size: i64,
        is_volatile: bool,
    },
    Storage {
        size: i64,
    },
    Subdivision {
        subdivision_type: SubdivisionType,
    },
    Numa {
        size: i64,
    },
}

/// A node of the topology tree
///
/// Tree links and data-path registrations are maintained by
/// [`Topology`](crate::Topology); a freshly built component is detached.
#[derive(Debug)]
pub struct Component {
    id: i32,
    name: String,
    component_type: ComponentType,
    details: ComponentDetails,
    pub(crate) depth: u32,
    pub(crate) parent: Option<ComponentKey>,
    pub(crate) children: Vec<ComponentKey>,
    pub(crate) outgoing: Vec<DataPathKey>,
    pub(crate) incoming: Vec<DataPathKey>,
    attributes: AttributeStore,
}

impl Component {
    /// Create a generic component of the given type
    pub fn new(id: i32, name: impl Into<String>, component_type: ComponentType) -> Self {
        Self::with_details(id, name, component_type, ComponentDetails::Generic)
    }

    fn with_details(
        id: i32,
        name: impl Into<String>,
        component_type: ComponentType,
        details: ComponentDetails,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            component_type,
            details,
            depth: 0,
            parent: None,
            children: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            attributes: AttributeStore::new(),
        }
    }

    /// Root component of a topology
    pub fn topology() -> Self {
        Self::new(0, "sys-sage Topology", ComponentType::Topology)
    }

    pub fn node(id: i32) -> Self {
        Self::new(id, "Node", ComponentType::Node)
    }

    pub fn core(id: i32) -> Self {
        Self::new(id, "Core", ComponentType::Core)
    }

    pub fn thread(id: i32) -> Self {
        Self::new(id, "Thread", ComponentType::Thread)
    }

    pub fn chip(
        id: i32,
        name: impl Into<String>,
        chip_type: ChipType,
        vendor: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_details(
            id,
            name,
            ComponentType::Chip,
            ComponentDetails::Chip {
                chip_type,
                vendor: vendor.into(),
                model: model.into(),
            },
        )
    }

    /// Cache named after its level ("L2", "L3", ...)
    pub fn cache(id: i32, level: i32, size: i64, associativity: i32, line_size: i32) -> Self {
        Self::cache_named(id, format!("L{}", level), level, size, associativity, line_size)
    }

    /// Cache with an explicit kind name such as "L1i" or "L1d"
    pub fn cache_named(
        id: i32,
        cache_name: impl Into<String>,
        level: i32,
        size: i64,
        associativity: i32,
        line_size: i32,
    ) -> Self {
        let cache_name = cache_name.into();
        Self::with_details(
            id,
            "cache",
            ComponentType::Cache,
            ComponentDetails::Cache {
                level,
                cache_name,
                size,
                associativity,
                line_size,
            },
        )
    }

    pub fn memory(id: i32, name: impl Into<String>, size: i64, is_volatile: bool) -> Self {
        Self::with_details(
            id,
            name,
            ComponentType::Memory,
            ComponentDetails::Memory { size, is_volatile },
        )
    }

    pub fn storage(size: i64) -> Self {
        Self::with_details(0, "Storage", ComponentType::Storage, ComponentDetails::Storage { size })
    }

    pub fn subdivision(id: i32, name: impl Into<String>, subdivision_type: SubdivisionType) -> Self {
        Self::with_details(
            id,
            name,
            ComponentType::Subdivision,
            ComponentDetails::Subdivision { subdivision_type },
        )
    }

    pub fn numa(id: i32, size: i64) -> Self {
        Self::with_details(id, "Numa", ComponentType::Numa, ComponentDetails::Numa { size })
    }

    /// Attach type-specific data, e.g. when rebuilding from a document
    pub fn set_details(&mut self, details: ComponentDetails) {
        self.details = details;
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn component_type_str(&self) -> &'static str {
        self.component_type.as_str()
    }

    pub fn details(&self) -> &ComponentDetails {
        &self.details
    }

    pub fn details_mut(&mut self) -> &mut ComponentDetails {
        &mut self.details
    }

    pub fn parent(&self) -> Option<ComponentKey> {
        self.parent
    }

    pub fn children(&self) -> &[ComponentKey] {
        &self.children
    }

    pub fn outgoing_data_paths(&self) -> &[DataPathKey] {
        &self.outgoing
    }

    pub fn incoming_data_paths(&self) -> &[DataPathKey] {
        &self.incoming
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    pub fn get_attribute(&self, key: &str) -> Result<&AttributeValue, AttributeError> {
        self.attributes.get(key)
    }

    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: OpaqueValue,
    ) -> Result<(), AttributeError> {
        self.attributes.set(key, value)
    }

    pub fn remove_attribute(&mut self, key: &str) -> Result<AttributeValue, AttributeError> {
        self.attributes.remove(key)
    }

    /// Typed setter for a built-in attribute
    pub fn set_builtin(&mut self, value: BuiltinValue) {
        self.attributes.set_builtin(value);
    }

    /// Current `Clock_Frequency`, in MHz
    pub fn frequency(&self) -> Option<f64> {
        match self.attributes.builtin(BuiltinAttribute::ClockFrequency) {
            Some(BuiltinValue::ClockFrequency(freq)) => Some(*freq),
            _ => None,
        }
    }

    pub fn frequency_history(&self) -> &[FrequencySample] {
        match self.attributes.builtin(BuiltinAttribute::FrequencyHistory) {
            Some(BuiltinValue::FrequencyHistory(samples)) => samples,
            _ => &[],
        }
    }

    /// Store a measured frequency, optionally appending it to `freq_history`
    pub fn record_frequency(&mut self, timestamp: i64, frequency: f64, keep_history: bool) {
        self.attributes.set_builtin(BuiltinValue::ClockFrequency(frequency));
        if !keep_history {
            return;
        }
        let sample = FrequencySample {
            timestamp,
            frequency,
        };
        match self.attributes.builtin_mut(BuiltinAttribute::FrequencyHistory) {
            Some(BuiltinValue::FrequencyHistory(samples)) => samples.push(sample),
            _ => self
                .attributes
                .set_builtin(BuiltinValue::FrequencyHistory(vec![sample])),
        }
    }

    /// [`Component::record_frequency`] stamped with the current Unix time
    pub fn record_frequency_now(&mut self, frequency: f64, keep_history: bool) {
        self.record_frequency(chrono::Utc::now().timestamp(), frequency, keep_history);
    }
}
