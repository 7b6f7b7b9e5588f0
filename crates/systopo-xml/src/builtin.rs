//! Native wire encoding of built-in attributes
//!
//! Scalars are written as `<Attribute name=".." value=".."/>`. The two
//! structured built-ins get their own layout:
//!
//! ```xml
//! <Attribute name="freq_history">
//!   <record timestamp="1700000000" frequency="2400"/>
//! </Attribute>
//! <Attribute name="GPU_Clock_Rate" value="1410" unit="MHz"/>
//! ```

use std::fmt::Display;
use std::str::FromStr;

use systopo_core::{BuiltinAttribute, BuiltinValue, FrequencySample};

use crate::element::Element;
use crate::error::{Result, XmlError};

pub const ATTRIBUTE_TAG: &str = "Attribute";
const RECORD_TAG: &str = "record";

pub fn encode_builtin(value: &BuiltinValue) -> Element {
    let mut element = Element::new(ATTRIBUTE_TAG).with_attr("name", value.attribute().name());
    match value {
        BuiltinValue::CatCos(v) | BuiltinValue::CatL3Mask(v) => element.push_attr("value", v),
        BuiltinValue::MigSize(v) => element.push_attr("value", v),
        BuiltinValue::StreamingMultiprocessors(v)
        | BuiltinValue::GpuCores(v)
        | BuiltinValue::CoresPerSm(v)
        | BuiltinValue::BusWidthBits(v) => element.push_attr("value", v),
        BuiltinValue::ClockFrequency(v) => element.push_attr("value", v),
        BuiltinValue::Latency(v) | BuiltinValue::LatencyMin(v) | BuiltinValue::LatencyMax(v) => {
            element.push_attr("value", v)
        }
        BuiltinValue::CudaComputeCapability(v) | BuiltinValue::MigUuid(v) => {
            element.push_attr("value", v)
        }
        BuiltinValue::FrequencyHistory(samples) => {
            for sample in samples {
                element.push_child(
                    Element::new(RECORD_TAG)
                        .with_attr("timestamp", sample.timestamp)
                        .with_attr("frequency", sample.frequency),
                );
            }
        }
        BuiltinValue::GpuClockRate { frequency, unit } => {
            element.push_attr("value", frequency);
            element.push_attr("unit", unit);
        }
    }
    element
}

pub fn decode_builtin(attribute: BuiltinAttribute, element: &Element) -> Result<BuiltinValue> {
    let value = match attribute {
        BuiltinAttribute::CatCos => BuiltinValue::CatCos(parse_attr(element, "value")?),
        BuiltinAttribute::CatL3Mask => BuiltinValue::CatL3Mask(parse_attr(element, "value")?),
        BuiltinAttribute::MigSize => BuiltinValue::MigSize(parse_attr(element, "value")?),
        BuiltinAttribute::StreamingMultiprocessors => {
            BuiltinValue::StreamingMultiprocessors(parse_attr(element, "value")?)
        }
        BuiltinAttribute::GpuCores => BuiltinValue::GpuCores(parse_attr(element, "value")?),
        BuiltinAttribute::CoresPerSm => BuiltinValue::CoresPerSm(parse_attr(element, "value")?),
        BuiltinAttribute::BusWidthBits => BuiltinValue::BusWidthBits(parse_attr(element, "value")?),
        BuiltinAttribute::ClockFrequency => {
            BuiltinValue::ClockFrequency(parse_attr(element, "value")?)
        }
        BuiltinAttribute::Latency => BuiltinValue::Latency(parse_attr(element, "value")?),
        BuiltinAttribute::LatencyMin => BuiltinValue::LatencyMin(parse_attr(element, "value")?),
        BuiltinAttribute::LatencyMax => BuiltinValue::LatencyMax(parse_attr(element, "value")?),
        BuiltinAttribute::CudaComputeCapability => {
            BuiltinValue::CudaComputeCapability(element.required_attr("value")?.to_string())
        }
        BuiltinAttribute::MigUuid => {
            BuiltinValue::MigUuid(element.required_attr("value")?.to_string())
        }
        BuiltinAttribute::FrequencyHistory => {
            let samples = element
                .elements()
                .filter(|e| e.name == RECORD_TAG)
                .map(|record| {
                    Ok(FrequencySample {
                        timestamp: parse_attr(record, "timestamp")?,
                        frequency: parse_attr(record, "frequency")?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            BuiltinValue::FrequencyHistory(samples)
        }
        BuiltinAttribute::GpuClockRate => BuiltinValue::GpuClockRate {
            frequency: parse_attr(element, "value")?,
            unit: element.attr("unit").unwrap_or_default().to_string(),
        },
    };
    Ok(value)
}

/// Parse a required XML attribute, mapping any failure to `Malformed`
pub(crate) fn parse_attr<T>(element: &Element, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = element.required_attr(key)?;
    raw.parse().map_err(|e| {
        XmlError::Malformed(format!(
            "<{}> attribute {}=\"{}\": {}",
            element.name, key, raw, e
        ))
    })
}
