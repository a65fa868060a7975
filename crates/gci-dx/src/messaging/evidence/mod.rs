//! Evidence aggregation over a classification's annotation graph.
//!
//! The aggregator produces an [`EvidenceIndex`]: publication lists keyed by evidence
//! category plus cumulative counters. Publication lists are deduplicated per
//! category by pmid; counters accumulate for every owned score.

mod counts;
mod rules;

pub use counts::evidence_counts;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::messaging::path::{is_truthy, owns, resolve, resolve_items};
use rules::{segregation_category, Classification, ScoredItem, Tally};

/// Category and counter keys that have fixed names.
pub mod category {
    pub const CONTRADICTS: &str = "contradicts";
    pub const CASE_CONTROL_SINGLE: &str = "case-control-single";
    pub const CASE_CONTROL_SINGLE_COUNT: &str = "case-control-single-count";
    pub const CASE_CONTROL_SINGLE_POINTS: &str = "case-control-single-points";
    pub const CASE_CONTROL_AGGREGATE: &str = "case-control-aggregate";
    pub const CASE_CONTROL_AGGREGATE_COUNT: &str = "case-control-aggregate-count";
    pub const CASE_CONTROL_AGGREGATE_POINTS: &str = "case-control-aggregate-points";
    pub const SEGREGATION_CANDIDATE_SEQUENCING: &str = "segregation-candidate-sequencing";
    pub const SEGREGATION_EXOME_SEQUENCING: &str = "segregation-exome-sequencing";
    pub const MODEL_SYSTEMS_AND_RESCUE_COUNT: &str = "exp-model-systems-and-rescue-count";
}

/// Article metadata captured for an annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PublicationSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmid: Option<Value>,
}

impl PublicationSummary {
    pub fn from_annotation(annotation: &Value) -> Self {
        let Some(article) = annotation.get("article") else {
            return Self::default();
        };

        Self {
            title: article.get("title").cloned(),
            author: article
                .get("authors")
                .and_then(Value::as_array)
                .and_then(|authors| authors.first())
                .cloned(),
            pubdate: article
                .get("date")
                .and_then(Value::as_str)
                .map(|date| date.split(';').next().unwrap_or(date).to_string()),
            source: article.get("journal").cloned(),
            pmid: article.get("pmid").cloned(),
        }
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Running case-control point total. Integer scores keep the total integral;
/// the first fractional-typed score turns it into a float for good.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointsTotal {
    Integer(i64),
    Real(f64),
}

impl Default for PointsTotal {
    fn default() -> Self {
        PointsTotal::Integer(0)
    }
}

impl PointsTotal {
    fn add(self, score: &Number) -> Self {
        match (self, score.as_i64()) {
            (PointsTotal::Integer(total), Some(score)) => total
                .checked_add(score)
                .map(PointsTotal::Integer)
                .unwrap_or(PointsTotal::Real(total as f64 + score as f64)),
            _ => PointsTotal::Real(self.as_f64() + score.as_f64().unwrap_or_default()),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            PointsTotal::Integer(total) => total as f64,
            PointsTotal::Real(total) => total,
        }
    }

    pub fn to_value(self) -> Value {
        match self {
            PointsTotal::Integer(total) => Value::from(total),
            PointsTotal::Real(total) => Number::from_f64(total)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        }
    }
}

/// Evidence grouped by category for one classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceIndex {
    publications: BTreeMap<String, Vec<PublicationSummary>>,
    counts: BTreeMap<String, u64>,
    points: BTreeMap<String, PointsTotal>,
}

impl EvidenceIndex {
    pub fn publications(&self, category: &str) -> Option<&[PublicationSummary]> {
        self.publications.get(category).map(Vec::as_slice)
    }

    pub fn count(&self, key: &str) -> Option<u64> {
        self.counts.get(key).copied()
    }

    pub fn points(&self, key: &str) -> Option<PointsTotal> {
        self.points.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.publications.contains_key(key)
            || self.counts.contains_key(key)
            || self.points.contains_key(key)
    }

    /// JSON form of a category list or counter, as embedded in messages.
    pub fn value(&self, key: &str) -> Option<Value> {
        if let Some(publications) = self.publications.get(key) {
            return Some(Value::Array(
                publications.iter().map(PublicationSummary::to_value).collect(),
            ));
        }
        if let Some(count) = self.counts.get(key) {
            return Some(Value::from(*count));
        }
        self.points.get(key).map(|total| total.to_value())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.publications.keys().map(String::as_str)
    }

    /// Appends the annotation's article unless its pmid is already listed.
    /// Annotations without an `article.pmid` are never recorded.
    fn record(&mut self, category: &str, annotation: &Value) -> bool {
        let Some(pmid) = resolve(annotation, &["article", "pmid"]) else {
            return false;
        };

        let publications = self.publications.entry(category.to_string()).or_default();
        if publications
            .iter()
            .any(|publication| publication.pmid.as_ref() == Some(pmid))
        {
            return false;
        }

        publications.push(PublicationSummary::from_annotation(annotation));
        true
    }

    fn tally(&mut self, tally: Tally) -> Result<(), EvidenceError> {
        match tally {
            Tally::CaseControl {
                count_key,
                points_key,
                points,
            } => {
                let Value::Number(points) = points else {
                    return Err(EvidenceError::NonNumericPoints { key: points_key });
                };
                self.increment(count_key);
                let total = self.points.entry(points_key.to_string()).or_default();
                *total = total.add(&points);
            }
            Tally::ModelSystemsAndRescue => self.increment(category::MODEL_SYSTEMS_AND_RESCUE_COUNT),
        }
        Ok(())
    }

    fn increment(&mut self, key: &str) {
        *self.counts.entry(key.to_string()).or_default() += 1;
    }

    /// Debug-friendly summary used when logging a build.
    pub fn summary(&self) -> Map<String, Value> {
        let mut summary = Map::new();
        for (key, publications) in &self.publications {
            summary.insert(key.clone(), Value::from(publications.len()));
        }
        for (key, count) in &self.counts {
            summary.insert(key.clone(), Value::from(*count));
        }
        for (key, total) in &self.points {
            summary.insert(key.clone(), total.to_value());
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceError {
    #[error("classification has no affiliation at resource.affiliation")]
    MissingAffiliation,
    #[error("score contributing to {key} is not numeric")]
    NonNumericPoints { key: &'static str },
}

/// Builds the evidence index for the classification embedded in `document`.
pub fn aggregate(document: &Value) -> Result<EvidenceIndex, EvidenceError> {
    let affiliation = resolve(document, &["resource", "affiliation"])
        .filter(|value| is_truthy(value))
        .ok_or(EvidenceError::MissingAffiliation)?;

    let mut walker = AnnotationWalker {
        affiliation: affiliation.as_str(),
        index: EvidenceIndex::default(),
    };

    let annotations = resolve(document, &["resourceParent", "gdm", "annotations"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    for annotation in annotations {
        walker.annotation(annotation)?;
    }

    Ok(walker.index)
}

struct AnnotationWalker<'a> {
    /// Non-string affiliations can never own a record.
    affiliation: Option<&'a str>,
    index: EvidenceIndex,
}

impl AnnotationWalker<'_> {
    fn owns(&self, record: &Value) -> bool {
        self.affiliation
            .is_some_and(|affiliation| owns(record, affiliation))
    }

    fn first_owned_score<'v>(&self, item: &'v Value) -> Option<&'v Value> {
        resolve_items(item, "scores")
            .iter()
            .find(|score| self.owns(score))
    }

    fn annotation(&mut self, annotation: &Value) -> Result<(), EvidenceError> {
        for group in resolve_items(annotation, "groups") {
            for family in resolve_items(group, "familyIncluded") {
                self.family(annotation, family)?;
            }
            for individual in resolve_items(group, "individualIncluded") {
                self.scored(annotation, individual, ScoredItem::Individual)?;
            }
        }

        for family in resolve_items(annotation, "families") {
            self.family(annotation, family)?;
        }

        for individual in resolve_items(annotation, "individuals") {
            self.scored(annotation, individual, ScoredItem::Individual)?;
        }

        for study in resolve_items(annotation, "caseControlStudies") {
            self.scored(annotation, study, ScoredItem::CaseControl)?;
        }

        for experimental in resolve_items(annotation, "experimentalData") {
            self.scored(annotation, experimental, ScoredItem::Experimental)?;
        }

        Ok(())
    }

    fn family(&mut self, annotation: &Value, family: &Value) -> Result<(), EvidenceError> {
        for individual in resolve_items(family, "individualIncluded") {
            self.scored(annotation, individual, ScoredItem::Individual)?;
        }

        if self.owns(family) {
            if let Some(category) = segregation_category(family) {
                self.index.record(category, annotation);
            }
        }

        Ok(())
    }

    fn scored(
        &mut self,
        annotation: &Value,
        item: &Value,
        kind: ScoredItem,
    ) -> Result<(), EvidenceError> {
        let Some(score) = self.first_owned_score(item) else {
            return Ok(());
        };

        if let Some(Classification { category, tally }) = kind.classify(item, score) {
            if let Some(tally) = tally {
                self.index.tally(tally)?;
            }
            if let Some(category) = category {
                self.index.record(&category, annotation);
            }
        }

        Ok(())
    }
}
