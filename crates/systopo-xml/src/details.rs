//! Type-specific component data as attributes of the component element

use systopo_core::{ChipType, ComponentDetails, ComponentType, SubdivisionType};

use crate::builtin::parse_attr;
use crate::element::Element;
use crate::error::{Result, XmlError};

pub fn write_details(element: &mut Element, details: &ComponentDetails) {
    match details {
        ComponentDetails::Generic => {}
        ComponentDetails::Chip {
            chip_type,
            vendor,
            model,
        } => {
            element.push_attr("chip_type", chip_type.code());
            element.push_attr("vendor", vendor);
            element.push_attr("model", model);
        }
        ComponentDetails::Cache {
            level,
            cache_name,
            size,
            associativity,
            line_size,
        } => {
            element.push_attr("cache_level", level);
            element.push_attr("cache_name", cache_name);
            element.push_attr("cache_size", size);
            element.push_attr("cache_associativity_ways", associativity);
            element.push_attr("cache_line_size", line_size);
        }
        ComponentDetails::Memory { size, is_volatile } => {
            element.push_attr("size", size);
            element.push_attr("is_volatile", u8::from(*is_volatile));
        }
        ComponentDetails::Storage { size } | ComponentDetails::Numa { size } => {
            element.push_attr("size", size);
        }
        ComponentDetails::Subdivision { subdivision_type } => {
            element.push_attr("subdivision_type", subdivision_type.code());
        }
    }
}

/// Rebuild details from whichever detail attributes the element carries
///
/// A bare `size` belongs to a NUMA region on `NUMA` elements and to storage
/// everywhere else.
pub fn read_details(element: &Element, component_type: ComponentType) -> Result<ComponentDetails> {
    if element.attr("chip_type").is_some() {
        let code: i32 = parse_attr(element, "chip_type")?;
        let chip_type = ChipType::from_code(code)
            .ok_or_else(|| XmlError::Malformed(format!("unknown chip_type {}", code)))?;
        return Ok(ComponentDetails::Chip {
            chip_type,
            vendor: element.attr("vendor").unwrap_or_default().to_string(),
            model: element.attr("model").unwrap_or_default().to_string(),
        });
    }
    if element.attr("cache_level").is_some() {
        return Ok(ComponentDetails::Cache {
            level: parse_attr(element, "cache_level")?,
            cache_name: element.attr("cache_name").unwrap_or_default().to_string(),
            size: parse_attr(element, "cache_size")?,
            associativity: parse_attr(element, "cache_associativity_ways")?,
            line_size: parse_attr(element, "cache_line_size")?,
        });
    }
    if element.attr("subdivision_type").is_some() {
        let code: i32 = parse_attr(element, "subdivision_type")?;
        let subdivision_type = SubdivisionType::from_code(code)
            .ok_or_else(|| XmlError::Malformed(format!("unknown subdivision_type {}", code)))?;
        return Ok(ComponentDetails::Subdivision { subdivision_type });
    }
    if let Some(flag) = element.attr("is_volatile") {
        let is_volatile = match flag {
            "1" | "true" => true,
            "0" | "false" => false,
            other => {
                return Err(XmlError::Malformed(format!(
                    "is_volatile must be 0 or 1, got '{}'",
                    other
                )))
            }
        };
        return Ok(ComponentDetails::Memory {
            size: parse_attr(element, "size")?,
            is_volatile,
        });
    }
    if element.attr("size").is_some() {
        let size = parse_attr(element, "size")?;
        return Ok(match component_type {
            ComponentType::Numa => ComponentDetails::Numa { size },
            _ => ComponentDetails::Storage { size },
        });
    }
    Ok(ComponentDetails::Generic)
}
