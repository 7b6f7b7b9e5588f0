//! Per-component attribute storage
//!
//! An [`AttributeStore`] keeps two kinds of values under one name-keyed map:
//! - built-in attributes, a closed registry ([`BuiltinAttribute`]) with a
//!   fixed Rust type and a fixed wire encoding
//! - opaque attributes, arbitrary caller values held by identity
//!
//! Built-in names are reserved. The generic setter refuses them; they are
//! written only through the typed setters on components and data paths.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    #[error("Attribute '{0}' not found")]
    NotFound(String),
    #[error("Attribute '{0}' is read-only")]
    ReadOnly(String),
}

/// The registry of attributes with a native type and wire encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinAttribute {
    /// Intel CAT class-of-service mask (u64)
    CatCos,
    /// Intel CAT L3 way mask (u64)
    CatL3Mask,
    /// MIG partition size in bytes (i64)
    MigSize,
    StreamingMultiprocessors,
    GpuCores,
    CoresPerSm,
    BusWidthBits,
    /// Clock frequency in MHz (f64)
    ClockFrequency,
    Latency,
    LatencyMin,
    LatencyMax,
    CudaComputeCapability,
    MigUuid,
    /// Time series of (timestamp, frequency) samples
    FrequencyHistory,
    /// GPU clock rate as a (frequency, unit) pair
    GpuClockRate,
}

impl BuiltinAttribute {
    pub const ALL: [BuiltinAttribute; 15] = [
        BuiltinAttribute::CatCos,
        BuiltinAttribute::CatL3Mask,
        BuiltinAttribute::MigSize,
        BuiltinAttribute::StreamingMultiprocessors,
        BuiltinAttribute::GpuCores,
        BuiltinAttribute::CoresPerSm,
        BuiltinAttribute::BusWidthBits,
        BuiltinAttribute::ClockFrequency,
        BuiltinAttribute::Latency,
        BuiltinAttribute::LatencyMin,
        BuiltinAttribute::LatencyMax,
        BuiltinAttribute::CudaComputeCapability,
        BuiltinAttribute::MigUuid,
        BuiltinAttribute::FrequencyHistory,
        BuiltinAttribute::GpuClockRate,
    ];

    /// Reserved attribute name, as used both as map key and on the wire
    pub fn name(self) -> &'static str {
        match self {
            Self::CatCos => "CATcos",
            Self::CatL3Mask => "CATL3mask",
            Self::MigSize => "mig_size",
            Self::StreamingMultiprocessors => "Number_of_streaming_multiprocessors",
            Self::GpuCores => "Number_of_cores_in_GPU",
            Self::CoresPerSm => "Number_of_cores_per_SM",
            Self::BusWidthBits => "Bus_Width_bit",
            Self::ClockFrequency => "Clock_Frequency",
            Self::Latency => "latency",
            Self::LatencyMin => "latency_min",
            Self::LatencyMax => "latency_max",
            Self::CudaComputeCapability => "CUDA_compute_capability",
            Self::MigUuid => "mig_uuid",
            Self::FrequencyHistory => "freq_history",
            Self::GpuClockRate => "GPU_Clock_Rate",
        }
    }

    /// Exact-match lookup of a reserved name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.name() == name)
    }
}

impl fmt::Display for BuiltinAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether `name` is reserved for a built-in attribute
pub fn is_builtin(name: &str) -> bool {
    BuiltinAttribute::from_name(name).is_some()
}

/// One entry of the `freq_history` series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencySample {
    pub timestamp: i64,
    pub frequency: f64,
}

/// Value of a built-in attribute; the variant determines the attribute
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinValue {
    CatCos(u64),
    CatL3Mask(u64),
    MigSize(i64),
    StreamingMultiprocessors(i32),
    GpuCores(i32),
    CoresPerSm(i32),
    BusWidthBits(i32),
    ClockFrequency(f64),
    Latency(f32),
    LatencyMin(f32),
    LatencyMax(f32),
    CudaComputeCapability(String),
    MigUuid(String),
    FrequencyHistory(Vec<FrequencySample>),
    GpuClockRate { frequency: f64, unit: String },
}

impl BuiltinValue {
    pub fn attribute(&self) -> BuiltinAttribute {
        match self {
            Self::CatCos(_) => BuiltinAttribute::CatCos,
            Self::CatL3Mask(_) => BuiltinAttribute::CatL3Mask,
            Self::MigSize(_) => BuiltinAttribute::MigSize,
            Self::StreamingMultiprocessors(_) => BuiltinAttribute::StreamingMultiprocessors,
            Self::GpuCores(_) => BuiltinAttribute::GpuCores,
            Self::CoresPerSm(_) => BuiltinAttribute::CoresPerSm,
            Self::BusWidthBits(_) => BuiltinAttribute::BusWidthBits,
            Self::ClockFrequency(_) => BuiltinAttribute::ClockFrequency,
            Self::Latency(_) => BuiltinAttribute::Latency,
            Self::LatencyMin(_) => BuiltinAttribute::LatencyMin,
            Self::LatencyMax(_) => BuiltinAttribute::LatencyMax,
            Self::CudaComputeCapability(_) => BuiltinAttribute::CudaComputeCapability,
            Self::MigUuid(_) => BuiltinAttribute::MigUuid,
            Self::FrequencyHistory(_) => BuiltinAttribute::FrequencyHistory,
            Self::GpuClockRate { .. } => BuiltinAttribute::GpuClockRate,
        }
    }
}

/// Owning handle to a caller-defined attribute value
///
/// The store never looks inside; codecs and callers recover the concrete
/// type with [`OpaqueValue::downcast_ref`].
pub struct OpaqueValue(Box<dyn Any + Send + Sync>);

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut::<T>()
    }

    /// Take the value back out, or return the handle unchanged on type mismatch
    pub fn into_inner<T: Any>(self) -> Result<T, Self> {
        match self.0.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(inner) => Err(Self(inner)),
        }
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpaqueValue(..)")
    }
}

/// A stored attribute value
#[derive(Debug)]
pub enum AttributeValue {
    Builtin(BuiltinValue),
    Opaque(OpaqueValue),
}

impl AttributeValue {
    pub fn as_builtin(&self) -> Option<&BuiltinValue> {
        match self {
            Self::Builtin(value) => Some(value),
            Self::Opaque(_) => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueValue> {
        match self {
            Self::Opaque(value) => Some(value),
            Self::Builtin(_) => None,
        }
    }
}

/// Name-keyed attribute map owned by a component or data path
#[derive(Debug, Default)]
pub struct AttributeStore {
    entries: BTreeMap<String, AttributeValue>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute of either kind
    pub fn get(&self, key: &str) -> Result<&AttributeValue, AttributeError> {
        self.entries
            .get(key)
            .ok_or_else(|| AttributeError::NotFound(key.to_string()))
    }

    /// Look up an opaque attribute and downcast it to `T`
    ///
    /// Returns `None` when the key is absent, built-in, or holds another type.
    pub fn get_as<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries
            .get(key)
            .and_then(AttributeValue::as_opaque)
            .and_then(OpaqueValue::downcast_ref::<T>)
    }

    /// Store an opaque value, dropping whatever the key held before
    pub fn set(&mut self, key: impl Into<String>, value: OpaqueValue) -> Result<(), AttributeError> {
        let key = key.into();
        if is_builtin(&key) {
            return Err(AttributeError::ReadOnly(key));
        }
        if self.entries.insert(key.clone(), AttributeValue::Opaque(value)).is_some() {
            trace!(attribute = %key, "Replaced opaque attribute");
        }
        Ok(())
    }

    /// Erase an attribute and hand its value back to the caller
    pub fn remove(&mut self, key: &str) -> Result<AttributeValue, AttributeError> {
        self.entries
            .remove(key)
            .ok_or_else(|| AttributeError::NotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn builtin(&self, attribute: BuiltinAttribute) -> Option<&BuiltinValue> {
        self.entries
            .get(attribute.name())
            .and_then(AttributeValue::as_builtin)
    }

    pub(crate) fn set_builtin(&mut self, value: BuiltinValue) {
        let key = value.attribute().name().to_string();
        self.entries.insert(key, AttributeValue::Builtin(value));
    }

    pub(crate) fn builtin_mut(&mut self, attribute: BuiltinAttribute) -> Option<&mut BuiltinValue> {
        match self.entries.get_mut(attribute.name()) {
            Some(AttributeValue::Builtin(value)) => Some(value),
            _ => None,
        }
    }

    /// Iterate entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
