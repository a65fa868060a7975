use serde_json::{Map, Value};

use super::directive::{Directive, ZeroPolicy, CONVERT_DEFAULT_KEY};
use super::{SequenceItem, TemplateMap, TemplateNode};
use crate::messaging::affiliation::AffiliationRegistry;
use crate::messaging::evidence::{category, EvidenceIndex};
use crate::messaging::path::{is_numeric_zero, is_truthy, resolve, DataPath};

/// Section that receives the contradictory-evidence summary.
pub const CONTRADICTORY_EVIDENCE_KEY: &str = "ValidContradictoryEvidence";

const CONTRADICTING_EVIDENCE_KINDS: [&str; 3] = ["proband", "experimental", "caseControl"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("cannot combine non-string value under '{key}'")]
    CombineNonString { key: String },
}

/// Inputs a template is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub document: &'a Value,
    pub evidence: &'a EvidenceIndex,
    pub counts: &'a Value,
    pub affiliations: &'a AffiliationRegistry,
}

/// Outcome of one directive: the value plus whether a falsy value survives pruning.
struct Evaluated {
    value: Value,
    keep_falsy: bool,
}

impl From<Value> for Evaluated {
    fn from(value: Value) -> Self {
        Self {
            value,
            keep_falsy: false,
        }
    }
}

fn unfilled() -> Value {
    Value::String(String::new())
}

impl RenderContext<'_> {
    fn lookup(&self, path: &DataPath) -> Value {
        resolve(self.document, path.keys())
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn count(&self, path: &DataPath) -> Value {
        resolve(self.counts, path.keys())
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub(crate) fn render_map(&self, map: &TemplateMap) -> Result<Map<String, Value>, RenderError> {
        let mut rendered = Map::new();

        for (key, node) in map.entries() {
            if let Some(value) = self.render_entry(key, node)? {
                rendered.insert(key.to_string(), value);
            }
        }

        Ok(rendered)
    }

    /// `None` prunes the key from its parent.
    fn render_entry(&self, key: &str, node: &TemplateNode) -> Result<Option<Value>, RenderError> {
        let value = match node {
            TemplateNode::Placeholder => None,
            TemplateNode::Literal(value) => Some(value.clone()),
            TemplateNode::Directive(directive) => {
                let Evaluated { value, keep_falsy } = self.evaluate(key, directive)?;
                (keep_falsy || is_truthy(&value)).then_some(value)
            }
            TemplateNode::Sequence(items) => {
                let rendered = items
                    .iter()
                    .map(|item| match item {
                        SequenceItem::Section(map) => self.render_map(map).map(Value::Object),
                        SequenceItem::Literal(value) => Ok(value.clone()),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (!rendered.is_empty()).then_some(Value::Array(rendered))
            }
            TemplateNode::Section(map) => {
                let mut rendered = self.render_map(map)?;
                if key == CONTRADICTORY_EVIDENCE_KEY {
                    self.add_contradictory_evidence(&mut rendered);
                }
                (!rendered.is_empty()).then_some(Value::Object(rendered))
            }
        };

        Ok(value)
    }

    fn evaluate(&self, key: &str, directive: &Directive) -> Result<Evaluated, RenderError> {
        let evaluated = match directive {
            Directive::PathToData(path) => self.lookup(path).into(),
            Directive::UseFirstData { excluded, paths } => {
                let mut found = Value::Null;
                for path in paths {
                    found = self.lookup(path);
                    if &found != excluded && !found.is_null() {
                        break;
                    }
                }
                if &found == excluded {
                    unfilled().into()
                } else {
                    found.into()
                }
            }
            Directive::CheckForData {
                path,
                when_present,
                when_absent,
            } => {
                if is_truthy(&self.lookup(path)) {
                    when_present.clone().into()
                } else {
                    when_absent.clone().into()
                }
            }
            Directive::ReplaceData { path, from, to } => match self.lookup(path) {
                Value::String(text) => Value::String(text.replace(from.as_str(), to)).into(),
                _ => unfilled().into(),
            },
            Directive::ConvertData { path, conversions } => {
                let converted = self
                    .lookup(path)
                    .as_str()
                    .and_then(|raw| conversions.get(raw))
                    .or_else(|| conversions.get(CONVERT_DEFAULT_KEY));
                converted.cloned().unwrap_or_else(unfilled).into()
            }
            Directive::CombineData { separator, parts } => {
                let rendered = self.render_map(parts)?;
                let pieces = rendered
                    .values()
                    .map(|value| {
                        value.as_str().ok_or_else(|| RenderError::CombineNonString {
                            key: key.to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Value::String(pieces.join(separator.as_str())).into()
            }
            Directive::LookupAffiliationName(path) => self
                .affiliations
                .name_for(&self.lookup(path))
                .map(|name| Value::String(name.to_string()))
                .unwrap_or(Value::Null)
                .into(),
            Directive::EvidenceCount(path) => self.count(path).into(),
            Directive::ScoreData { path, zero_policy } => {
                let value = self.lookup(path);
                let keep_falsy = is_numeric_zero(&value)
                    && match zero_policy {
                        ZeroPolicy::Always => true,
                        ZeroPolicy::WhenCounted(paths) => {
                            paths.iter().any(|path| is_truthy(&self.count(path)))
                        }
                    };
                Evaluated { value, keep_falsy }
            }
            Directive::EvidenceData {
                category,
                keep_empty,
            } => match self.evidence.value(category) {
                Some(value) => Evaluated {
                    keep_falsy: *keep_empty && !is_truthy(&value),
                    value,
                },
                None => unfilled().into(),
            },
            Directive::Unfilled(_) => unfilled().into(),
        };

        Ok(evaluated)
    }

    /// Marks the section YES/NO and attaches contradicting publications when any
    /// contradicting evidence was recorded on the classification.
    fn add_contradictory_evidence(&self, section: &mut Map<String, Value>) {
        let contradicting = resolve(self.document, &["resource", "contradictingEvidence"]);
        let has_contradictions = contradicting.is_some_and(|evidence| {
            CONTRADICTING_EVIDENCE_KINDS
                .iter()
                .any(|kind| evidence.get(kind).is_some_and(is_truthy))
        });

        if has_contradictions {
            section.insert("Value".to_string(), Value::from("YES"));
            if let Some(publications) = self.evidence.value(category::CONTRADICTS) {
                let mut evidence = Map::new();
                evidence.insert("Publications".to_string(), publications);
                section.insert("Evidence".to_string(), Value::Object(evidence));
            }
        } else {
            section.insert("Value".to_string(), Value::from("NO"));
        }
    }
}
