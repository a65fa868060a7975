use serde_json::{Map, Value};

const EVIDENCE_COUNT: &str = "evidenceCount";

/// Reduces classification points to the strictly positive `evidenceCount` fields.
///
/// Nested mappings are reduced recursively and dropped once empty; every other
/// value (strings, booleans, arrays, nulls, non-count numbers) is discarded. The
/// input is left untouched.
pub fn evidence_counts(points: &Map<String, Value>) -> Map<String, Value> {
    let mut reduced = Map::new();

    for (key, value) in points {
        match value {
            Value::Number(number) => {
                if key.contains(EVIDENCE_COUNT) && number.as_f64().is_some_and(|n| n > 0.0) {
                    reduced.insert(key.clone(), value.clone());
                }
            }
            Value::Object(nested) => {
                let nested = evidence_counts(nested);
                if !nested.is_empty() {
                    reduced.insert(key.clone(), Value::Object(nested));
                }
            }
            _ => {}
        }
    }

    reduced
}
