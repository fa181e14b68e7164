// title/ciosmap.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Parses the XML maps that describe how to build a cIOS from a base IOS.

use roxmltree::{Document, Node};
use thiserror::Error;
use crate::title::patch::Patch;

#[derive(Debug, Error)]
pub enum CiosMapError {
    #[error("cIOS map is not valid XML")]
    Xml(#[from] roxmltree::Error),
    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute { element: String, attribute: String },
    #[error("attribute `{attribute}` has invalid value `{value}`")]
    InvalidNumber { attribute: String, value: String },
    #[error("`{0}` is not a valid comma separated byte list")]
    InvalidByteList(String),
}

/// Where an additional module goes in the content list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModulePlacement {
    /// Added after all existing contents.
    Append,
    /// Takes over this position, moving the content that was there to the end.
    Index(usize),
}

/// A `<content>` entry of a base: patches for an existing content, an additional module, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub content_id: u32,
    pub module: Option<String>,
    pub placement: ModulePlacement,
    pub patches: Vec<Patch>,
}

/// A base IOS that a cIOS can be built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiosBase {
    pub ios: u32,
    pub version: u16,
    pub contents: Vec<ContentEntry>,
}

/// A `<ciosgroup>` of a map. Its bases are only parsed when one is asked for.
#[derive(Clone, Copy)]
pub struct CiosGroup<'a, 'input> {
    node: Node<'a, 'input>,
}

impl<'a, 'input> CiosGroup<'a, 'input> {
    pub fn name(&self) -> &'a str {
        self.node.attribute("name").unwrap_or_default()
    }

    /// Parses the base for the given IOS number, if this group supports it. Other bases in the
    /// group are skipped without being checked.
    pub fn base(&self, ios: u32) -> Result<Option<CiosBase>, CiosMapError> {
        let found = elements(self.node, "base")
            .find(|node| node.attribute("ios").and_then(|value| value.trim().parse::<u32>().ok()) == Some(ios));
        match found {
            Some(node) => Ok(Some(parse_base(node, ios)?)),
            None => Ok(None),
        }
    }
}

/// A cIOS map document. Only the group and base that a build asks for are fully parsed, so an
/// error elsewhere in the map doesn't prevent building from it.
pub struct CiosMap<'input> {
    doc: Document<'input>,
}

impl<'input> CiosMap<'input> {
    /// Parses a cIOS map from its XML text. Only the XML itself is checked here.
    pub fn parse(text: &'input str) -> Result<Self, CiosMapError> {
        Ok(CiosMap { doc: Document::parse(text)? })
    }

    /// Gets the first group with the given name, if the map has one.
    pub fn group(&self, name: &str) -> Option<CiosGroup<'_, 'input>> {
        elements(self.doc.root_element(), "ciosgroup")
            .find(|node| node.attribute("name") == Some(name))
            .map(|node| CiosGroup { node })
    }
}

fn elements<'a, 'input: 'a>(node: Node<'a, 'input>, tag: &'static str) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |child| child.is_element() && child.has_tag_name(tag))
}

fn required<'a>(node: Node<'a, '_>, attribute: &str) -> Result<&'a str, CiosMapError> {
    node.attribute(attribute).ok_or_else(|| CiosMapError::MissingAttribute {
        element: node.tag_name().name().to_string(),
        attribute: attribute.to_string(),
    })
}

fn invalid(attribute: &str, value: &str) -> CiosMapError {
    CiosMapError::InvalidNumber { attribute: attribute.to_string(), value: value.to_string() }
}

fn strip_hex_prefix(value: &str) -> &str {
    let value = value.trim();
    value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value)
}

fn parse_dec<T: std::str::FromStr>(attribute: &str, value: &str) -> Result<T, CiosMapError> {
    value.trim().parse().map_err(|_| invalid(attribute, value))
}

fn parse_hex(attribute: &str, value: &str) -> Result<u64, CiosMapError> {
    u64::from_str_radix(strip_hex_prefix(value), 16).map_err(|_| invalid(attribute, value))
}

/// Parses a list like `0x20,0x07,0x23,0xA2`.
fn parse_byte_list(value: &str) -> Result<Vec<u8>, CiosMapError> {
    value.split(',')
        .map(|token| u8::from_str_radix(strip_hex_prefix(token), 16)
            .map_err(|_| CiosMapError::InvalidByteList(value.to_string())))
        .collect()
}

fn parse_base(node: Node, ios: u32) -> Result<CiosBase, CiosMapError> {
    let contents = elements(node, "content")
        .map(parse_content)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CiosBase {
        ios,
        version: parse_dec("version", required(node, "version")?)?,
        contents,
    })
}

fn parse_content(node: Node) -> Result<ContentEntry, CiosMapError> {
    let id = required(node, "id")?;
    let content_id = u32::try_from(parse_hex("id", id)?).map_err(|_| invalid("id", id))?;
    // A missing tmdmoduleid, or -1, both mean the module goes at the end.
    let placement = match node.attribute("tmdmoduleid").map(str::trim) {
        None | Some("-1") => ModulePlacement::Append,
        Some(value) => ModulePlacement::Index(parse_hex("tmdmoduleid", value)? as usize),
    };
    let patches = elements(node, "patch")
        .map(parse_patch)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ContentEntry {
        content_id,
        module: node.attribute("module").map(str::to_string),
        placement,
        patches,
    })
}

fn parse_patch(node: Node) -> Result<Patch, CiosMapError> {
    Ok(Patch {
        offset: parse_hex("offset", required(node, "offset")?)? as usize,
        original: parse_byte_list(required(node, "originalbytes")?)?,
        replacement: parse_byte_list(required(node, "newbytes")?)?,
    })
}
