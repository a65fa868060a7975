use serde_json::{Map, Value};

use super::TemplateMap;
use crate::messaging::path::DataPath;

/// Tags recognised as the first element of a template list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveTag {
    PathToData,
    UseFirstData,
    CheckForData,
    ReplaceData,
    ConvertData,
    CombineData,
    LookupAffiliationName,
    EvidenceCount,
    ScoreData,
    EvidenceData,
}

impl DirectiveTag {
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = match tag {
            "$PATH_TO_DATA" => Self::PathToData,
            "$USE_FIRST_DATA" => Self::UseFirstData,
            "$CHECK_FOR_DATA" => Self::CheckForData,
            "$REPLACE_DATA" => Self::ReplaceData,
            "$CONVERT_DATA" => Self::ConvertData,
            "$COMBINE_DATA" => Self::CombineData,
            "$LOOKUP_AFFILIATION_NAME" => Self::LookupAffiliationName,
            "$EVIDENCE_COUNT" => Self::EvidenceCount,
            "$SCORE_DATA" => Self::ScoreData,
            "$EVIDENCE_DATA" => Self::EvidenceData,
            _ => return None,
        };
        Some(tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PathToData => "$PATH_TO_DATA",
            Self::UseFirstData => "$USE_FIRST_DATA",
            Self::CheckForData => "$CHECK_FOR_DATA",
            Self::ReplaceData => "$REPLACE_DATA",
            Self::ConvertData => "$CONVERT_DATA",
            Self::CombineData => "$COMBINE_DATA",
            Self::LookupAffiliationName => "$LOOKUP_AFFILIATION_NAME",
            Self::EvidenceCount => "$EVIDENCE_COUNT",
            Self::ScoreData => "$SCORE_DATA",
            Self::EvidenceData => "$EVIDENCE_DATA",
        }
    }
}

/// When a resolved score of exactly zero is still worth emitting.
#[derive(Debug, Clone, PartialEq)]
pub enum ZeroPolicy {
    Always,
    /// Keep the zero if any of these paths is truthy in the evidence counts.
    WhenCounted(Vec<DataPath>),
}

/// Parsed template instruction with typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    PathToData(DataPath),
    UseFirstData {
        excluded: Value,
        paths: Vec<DataPath>,
    },
    CheckForData {
        path: DataPath,
        when_present: Value,
        when_absent: Value,
    },
    ReplaceData {
        path: DataPath,
        from: String,
        to: String,
    },
    ConvertData {
        path: DataPath,
        conversions: Map<String, Value>,
    },
    CombineData {
        separator: String,
        parts: TemplateMap,
    },
    LookupAffiliationName(DataPath),
    EvidenceCount(DataPath),
    ScoreData {
        path: DataPath,
        zero_policy: ZeroPolicy,
    },
    EvidenceData {
        category: String,
        keep_empty: bool,
    },
    /// Arguments did not fit the directive; renders as an unfilled placeholder.
    Unfilled(DirectiveTag),
}

/// Key looked up in a `$CONVERT_DATA` map when the resolved value is unmapped.
pub const CONVERT_DEFAULT_KEY: &str = "$DEFAULT";

impl Directive {
    /// Parses a template list whose first element is a directive tag. Returns
    /// `None` for ordinary lists.
    pub(crate) fn parse(items: &[Value]) -> Option<Self> {
        let (head, args) = items.split_first()?;
        let tag = DirectiveTag::from_tag(head.as_str()?)?;

        let directive = match (tag, args) {
            (DirectiveTag::PathToData, keys) => Self::PathToData(DataPath::from_value(
                &Value::Array(keys.to_vec()),
            )),
            (DirectiveTag::UseFirstData, [excluded, paths @ ..]) if !paths.is_empty() => {
                Self::UseFirstData {
                    excluded: excluded.clone(),
                    paths: paths.iter().map(DataPath::from_value).collect(),
                }
            }
            (DirectiveTag::CheckForData, [path, when_present, when_absent]) => {
                Self::CheckForData {
                    path: DataPath::from_value(path),
                    when_present: when_present.clone(),
                    when_absent: when_absent.clone(),
                }
            }
            (DirectiveTag::ReplaceData, [path, Value::String(from), Value::String(to)]) => {
                Self::ReplaceData {
                    path: DataPath::from_value(path),
                    from: from.clone(),
                    to: to.clone(),
                }
            }
            (DirectiveTag::ConvertData, [path, Value::Object(conversions)]) => Self::ConvertData {
                path: DataPath::from_value(path),
                conversions: conversions.clone(),
            },
            (DirectiveTag::CombineData, [Value::String(separator), Value::Object(parts)]) => {
                Self::CombineData {
                    separator: separator.clone(),
                    parts: TemplateMap::parse(parts),
                }
            }
            (DirectiveTag::LookupAffiliationName, [path]) => {
                Self::LookupAffiliationName(DataPath::from_value(path))
            }
            (DirectiveTag::EvidenceCount, [path]) => Self::EvidenceCount(DataPath::from_value(path)),
            (DirectiveTag::ScoreData, [path, first, rest @ ..]) => {
                let zero_policy = if first == &Value::Bool(true) {
                    ZeroPolicy::Always
                } else {
                    ZeroPolicy::WhenCounted(
                        std::iter::once(first)
                            .chain(rest)
                            .map(DataPath::from_value)
                            .collect(),
                    )
                };
                Self::ScoreData {
                    path: DataPath::from_value(path),
                    zero_policy,
                }
            }
            (DirectiveTag::EvidenceData, [Value::String(category)]) => Self::EvidenceData {
                category: category.clone(),
                keep_empty: false,
            },
            (DirectiveTag::EvidenceData, [Value::String(category), keep_empty]) => {
                Self::EvidenceData {
                    category: category.clone(),
                    keep_empty: keep_empty == &Value::Bool(true),
                }
            }
            (tag, _) => {
                tracing::warn!(directive = tag.as_str(), args = args.len(), "directive arguments do not match; it will render empty");
                Self::Unfilled(tag)
            }
        };

        Some(directive)
    }
}
