use serde_json::Value;

use super::category;
use crate::messaging::path::{is_truthy, resolve};

/// Scored evidence item shapes that share the first-owned-score rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScoredItem {
    Individual,
    CaseControl,
    Experimental,
}

/// Cumulative counter updates attached to a classification.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tally {
    CaseControl {
        count_key: &'static str,
        points_key: &'static str,
        points: Value,
    },
    ModelSystemsAndRescue,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Classification {
    pub category: Option<String>,
    pub tally: Option<Tally>,
}

impl Classification {
    fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            tally: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum StatusPredicate {
    Any,
    Is(&'static str),
}

impl StatusPredicate {
    fn matches(self, score: &Value) -> bool {
        match self {
            StatusPredicate::Any => true,
            StatusPredicate::Is(expected) => {
                score.get("scoreStatus").and_then(Value::as_str) == Some(expected)
            }
        }
    }
}

struct ScoreRule {
    status: StatusPredicate,
    classify: fn(&Value, &Value) -> Option<Classification>,
}

const SCORE: &str = "Score";
const CONTRADICTS: &str = "Contradicts";

const INDIVIDUAL_RULES: &[ScoreRule] = &[
    ScoreRule {
        status: StatusPredicate::Is(SCORE),
        classify: case_info_type,
    },
    ScoreRule {
        status: StatusPredicate::Is(CONTRADICTS),
        classify: contradicts,
    },
];

const CASE_CONTROL_RULES: &[ScoreRule] = &[ScoreRule {
    status: StatusPredicate::Any,
    classify: study_type,
}];

const EXPERIMENTAL_RULES: &[ScoreRule] = &[
    ScoreRule {
        status: StatusPredicate::Is(SCORE),
        classify: experimental_type,
    },
    ScoreRule {
        status: StatusPredicate::Is(CONTRADICTS),
        classify: contradicts,
    },
];

impl ScoredItem {
    fn rules(self) -> &'static [ScoreRule] {
        match self {
            ScoredItem::Individual => INDIVIDUAL_RULES,
            ScoredItem::CaseControl => CASE_CONTROL_RULES,
            ScoredItem::Experimental => EXPERIMENTAL_RULES,
        }
    }

    /// First rule whose status predicate holds and whose classifier matches.
    pub(crate) fn classify(self, item: &Value, score: &Value) -> Option<Classification> {
        self.rules()
            .iter()
            .filter(|rule| rule.status.matches(score))
            .find_map(|rule| (rule.classify)(item, score))
    }
}

fn case_info_type(_individual: &Value, score: &Value) -> Option<Classification> {
    score
        .get("caseInfoType")
        .and_then(Value::as_str)
        .map(Classification::category)
}

fn contradicts(_item: &Value, _score: &Value) -> Option<Classification> {
    Some(Classification::category(category::CONTRADICTS))
}

fn study_type(study: &Value, score: &Value) -> Option<Classification> {
    let (category, count_key, points_key) = match study.get("studyType").and_then(Value::as_str)? {
        "Single variant analysis" => (
            category::CASE_CONTROL_SINGLE,
            category::CASE_CONTROL_SINGLE_COUNT,
            category::CASE_CONTROL_SINGLE_POINTS,
        ),
        "Aggregate variant analysis" => (
            category::CASE_CONTROL_AGGREGATE,
            category::CASE_CONTROL_AGGREGATE_COUNT,
            category::CASE_CONTROL_AGGREGATE_POINTS,
        ),
        _ => return None,
    };

    let tally = score.get("score").map(|points| Tally::CaseControl {
        count_key,
        points_key,
        points: points.clone(),
    });

    Some(Classification {
        category: Some(category.to_string()),
        tally,
    })
}

/// Evidence types whose category depends on a nested sub-type field.
struct SubtypedEvidence {
    evidence_type: &'static str,
    container: &'static str,
    field: &'static str,
    categories: &'static [(&'static str, &'static str)],
    counts_toward_model_systems_and_rescue: bool,
}

const FLAT_EXPERIMENTAL: &[(&str, &str)] = &[
    ("Biochemical Function", "exp-biochemical-function"),
    ("Protein Interactions", "exp-protein-interactions"),
    ("Expression", "exp-expression"),
];

const SUBTYPED_EXPERIMENTAL: &[SubtypedEvidence] = &[
    SubtypedEvidence {
        evidence_type: "Functional Alteration",
        container: "functionalAlteration",
        field: "functionalAlterationType",
        categories: &[
            ("Patient cells", "exp-functional-alteration-patient-cells"),
            ("Non-patient cells", "exp-functional-alteration-non-patient-cells"),
        ],
        counts_toward_model_systems_and_rescue: false,
    },
    SubtypedEvidence {
        evidence_type: "Model Systems",
        container: "modelSystems",
        field: "modelSystemsType",
        categories: &[
            (
                "Non-human model organism",
                "exp-model-systems-non-human-model-organism",
            ),
            ("Cell culture model", "exp-model-systems-cell-culture-model"),
        ],
        counts_toward_model_systems_and_rescue: true,
    },
    SubtypedEvidence {
        evidence_type: "Rescue",
        container: "rescue",
        field: "rescueType",
        categories: &[
            ("Human", "exp-rescue-human"),
            ("Non-human model organism", "exp-rescue-non-human-model-organism"),
            ("Cell culture model", "exp-rescue-cell-culture-model"),
            ("Patient cells", "exp-rescue-patient-cells"),
        ],
        counts_toward_model_systems_and_rescue: true,
    },
];

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, category)| *category)
}

fn experimental_type(experimental: &Value, _score: &Value) -> Option<Classification> {
    let evidence_type = experimental.get("evidenceType").and_then(Value::as_str)?;

    if let Some(category) = lookup(FLAT_EXPERIMENTAL, evidence_type) {
        return Some(Classification::category(category));
    }

    let subtyped = SUBTYPED_EXPERIMENTAL
        .iter()
        .find(|entry| entry.evidence_type == evidence_type)?;
    let subtype = resolve(experimental, &[subtyped.container, subtyped.field])
        .and_then(Value::as_str)?;
    let category = lookup(subtyped.categories, subtype)?;

    Some(Classification {
        category: Some(category.to_string()),
        tally: subtyped
            .counts_toward_model_systems_and_rescue
            .then_some(Tally::ModelSystemsAndRescue),
    })
}

/// Category for an owned family whose LOD score counts toward the aggregate.
pub(crate) fn segregation_category(family: &Value) -> Option<&'static str> {
    let segregation = family.get("segregation")?.as_object()?;

    let included = segregation
        .get("includeLodScoreInAggregateCalculation")
        .is_some_and(is_truthy);
    let has_lod_score =
        segregation.contains_key("publishedLodScore") || segregation.contains_key("estimatedLodScore");
    if !included || !has_lod_score {
        return None;
    }

    match segregation.get("sequencingMethod").and_then(Value::as_str)? {
        "Candidate gene sequencing" => Some(category::SEGREGATION_CANDIDATE_SEQUENCING),
        "Exome/genome or all genes sequenced in linkage region" => {
            Some(category::SEGREGATION_EXOME_SEQUENCING)
        }
        _ => None,
    }
}
