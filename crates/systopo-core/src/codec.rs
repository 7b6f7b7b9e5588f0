//! Caller-supplied serialization of opaque attributes
//!
//! An exporter or importer consults an [`AttributeCodec`] for every
//! attribute whose name is not a built-in. Codecs are passed per call, so
//! there is no process-wide callback state. Every method has a default that
//! declines, so an implementation only overrides the directions it supports.

use anyhow::Result;

use crate::arena::ComponentKey;
use crate::attribute::OpaqueValue;
use crate::topology::Topology;

pub trait AttributeCodec {
    /// Render `value` as a single string, or `Ok(None)` if not representable
    fn encode(&self, _name: &str, _value: &OpaqueValue) -> Result<Option<String>> {
        Ok(None)
    }

    /// Render `value` as an XML fragment to splice inside the attribute element
    ///
    /// Consulted only when [`AttributeCodec::encode`] declined.
    fn encode_complex(&self, _name: &str, _value: &OpaqueValue) -> Result<Option<String>> {
        Ok(None)
    }

    /// Rebuild a value from its serialized attribute element
    fn decode(&self, _name: &str, _fragment: &str) -> Result<Option<OpaqueValue>> {
        Ok(None)
    }

    /// Apply a serialized attribute element directly to its owning component
    ///
    /// Consulted only when [`AttributeCodec::decode`] declined. The decoder
    /// may read and extend the partially imported topology; returns whether
    /// the fragment was recognized.
    fn decode_complex(
        &self,
        _name: &str,
        _fragment: &str,
        _topology: &mut Topology,
        _owner: ComponentKey,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Codec that declines everything; opaque attributes are dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCodec;

impl AttributeCodec for NoCodec {}

type EncodeFn = Box<dyn Fn(&str, &OpaqueValue) -> Result<Option<String>>>;
type DecodeFn = Box<dyn Fn(&str, &str) -> Result<Option<OpaqueValue>>>;
type DecodeComplexFn = Box<dyn Fn(&str, &str, &mut Topology, ComponentKey) -> Result<bool>>;

/// Codec assembled from optional closures
///
/// ```
/// use systopo_core::{CallbackCodec, OpaqueValue};
///
/// let codec = CallbackCodec::new()
///     .on_encode(|_, v| Ok(v.downcast_ref::<String>().cloned()))
///     .on_decode(|_, fragment| Ok(Some(OpaqueValue::new(fragment.to_string()))));
/// # let _ = codec;
/// ```
#[derive(Default)]
pub struct CallbackCodec {
    encode: Option<EncodeFn>,
    encode_complex: Option<EncodeFn>,
    decode: Option<DecodeFn>,
    decode_complex: Option<DecodeComplexFn>,
}

impl CallbackCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_encode<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &OpaqueValue) -> Result<Option<String>> + 'static,
    {
        self.encode = Some(Box::new(f));
        self
    }

    pub fn on_encode_complex<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &OpaqueValue) -> Result<Option<String>> + 'static,
    {
        self.encode_complex = Some(Box::new(f));
        self
    }

    pub fn on_decode<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) -> Result<Option<OpaqueValue>> + 'static,
    {
        self.decode = Some(Box::new(f));
        self
    }

    pub fn on_decode_complex<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, &mut Topology, ComponentKey) -> Result<bool> + 'static,
    {
        self.decode_complex = Some(Box::new(f));
        self
    }
}

impl AttributeCodec for CallbackCodec {
    fn encode(&self, name: &str, value: &OpaqueValue) -> Result<Option<String>> {
        match &self.encode {
            Some(f) => f(name, value),
            None => Ok(None),
        }
    }

    fn encode_complex(&self, name: &str, value: &OpaqueValue) -> Result<Option<String>> {
        match &self.encode_complex {
            Some(f) => f(name, value),
            None => Ok(None),
        }
    }

    fn decode(&self, name: &str, fragment: &str) -> Result<Option<OpaqueValue>> {
        match &self.decode {
            Some(f) => f(name, fragment),
            None => Ok(None),
        }
    }

    fn decode_complex(
        &self,
        name: &str,
        fragment: &str,
        topology: &mut Topology,
        owner: ComponentKey,
    ) -> Result<bool> {
        match &self.decode_complex {
            Some(f) => f(name, fragment, topology, owner),
            None => Ok(false),
        }
    }
}
