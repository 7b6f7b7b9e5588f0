use systopo_core::TopologyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Malformed exchange document: {0}")]
    Malformed(String),
    #[error("Unknown component element <{0}>")]
    UnknownComponentType(String),
    #[error("Data path references unknown component addr {0}")]
    UnresolvedReference(String),
    #[error("Elements nest deeper than {0} levels")]
    TooDeep(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid XML attribute: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("Document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

pub type Result<T> = std::result::Result<T, XmlError>;
