//! Declarative message templates.
//!
//! A template is parsed once into an immutable tree of [`TemplateNode`]s. Rendering
//! never touches the definition; every request builds a fresh output tree.

mod directive;
mod render;

pub use directive::{Directive, DirectiveTag, ZeroPolicy, CONVERT_DEFAULT_KEY};
pub use render::{RenderContext, RenderError, CONTRADICTORY_EVIDENCE_KEY};

use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};

const GCI_TO_DX: &str = include_str!("../../../templates/gci_to_dx.json");

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Empty string: an unfilled slot that is always pruned.
    Placeholder,
    /// Any other scalar, emitted verbatim.
    Literal(Value),
    Directive(Directive),
    Sequence(Vec<SequenceItem>),
    Section(TemplateMap),
}

/// Element of a plain (non-directive) template list.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceItem {
    Section(TemplateMap),
    Literal(Value),
}

/// Ordered key/node pairs of one template level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateMap {
    entries: Vec<(String, TemplateNode)>,
}

impl TemplateMap {
    pub(crate) fn parse(map: &Map<String, Value>) -> Self {
        Self {
            entries: map
                .iter()
                .map(|(key, value)| (key.clone(), TemplateNode::parse(value)))
                .collect(),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &TemplateNode)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn get(&self, key: &str) -> Option<&TemplateNode> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, node)| node)
    }
}

impl TemplateNode {
    fn parse(value: &Value) -> Self {
        match value {
            Value::String(text) if text.is_empty() => Self::Placeholder,
            Value::Array(items) => match Directive::parse(items) {
                Some(directive) => Self::Directive(directive),
                None => Self::Sequence(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::Object(map) => SequenceItem::Section(TemplateMap::parse(map)),
                            other => SequenceItem::Literal(other.clone()),
                        })
                        .collect(),
                ),
            },
            Value::Object(map) => Self::Section(TemplateMap::parse(map)),
            other => Self::Literal(other.clone()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read message template: {0}")]
    Io(#[from] std::io::Error),
    #[error("message template is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message template must be a JSON object at the top level")]
    NotAMapping,
}

/// Immutable message template shared across requests.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    root: TemplateMap,
}

impl MessageTemplate {
    /// The gene-validity template bundled with the crate.
    pub fn gci_to_dx() -> Result<Self, TemplateError> {
        Self::from_json_str(GCI_TO_DX)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TemplateError> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_value(&value)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, TemplateError> {
        let map = value.as_object().ok_or(TemplateError::NotAMapping)?;
        Ok(Self {
            root: TemplateMap::parse(map),
        })
    }

    pub fn root(&self) -> &TemplateMap {
        &self.root
    }

    /// Evaluates the template, returning the outbound message tree.
    pub fn render(&self, context: &RenderContext<'_>) -> Result<Map<String, Value>, RenderError> {
        context.render_map(&self.root)
    }
}
