use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::config::{BrokerProfile, BrokerRouting, DeliveryConfig, TlsFiles};
use crate::messaging::affiliation::AffiliationRegistry;
use crate::messaging::broker::{BrokerError, BrokerTarget, DeliveryReceipt, MessageBroker};
use crate::messaging::evidence::EvidenceIndex;
use crate::messaging::publisher::MessagePublisher;
use crate::messaging::store::{DocumentStore, StoreError};
use crate::messaging::template::{MessageTemplate, RenderContext};

pub(super) const AFFILIATION: &str = "10007";
pub(super) const LOCAL_HOST: &str = "localhost:6543";
pub(super) const PRODUCTION_HOST: &str = "curation.clinicalgenome.org";

pub(super) fn article(pmid: &str) -> Value {
    json!({
        "title": format!("Functional study {pmid}"),
        "authors": ["Dietz HC", "Pyeritz RE"],
        "date": "1991 Jul 25;352(6333):337-9",
        "journal": "Nature",
        "pmid": pmid
    })
}

pub(super) fn owned_score(status: &str) -> Value {
    json!({ "affiliation": AFFILIATION, "scoreStatus": status })
}

pub(super) fn biochemical_function(scores: Value) -> Value {
    json!({ "evidenceType": "Biochemical Function", "scores": scores })
}

/// Embedded classification with a single owned biochemical-function item.
pub(super) fn classification_document() -> Value {
    json!({
        "resource": {
            "uuid": "gv-0001",
            "affiliation": AFFILIATION,
            "autoClassification": "Moderate",
            "alteredClassification": "No Modification",
            "approvalDate": "2020-01-02",
            "evidenceSummary": "Biochemical evidence supports the association.",
            "replicatedOverTime": false,
            "contradictingEvidence": { "proband": false, "experimental": false, "caseControl": false },
            "classificationPoints": {
                "autosomalDominantOrXlinkedDisorder": {
                    "variantIsDeNovo": { "evidenceCount": 0, "evidencePointsTotal": 0, "pointsCounted": 0 }
                },
                "segregation": {
                    "evidenceCountCandidate": 0,
                    "evidenceCountExome": 0,
                    "evidencePointsTotal": 0,
                    "pointsCounted": 0
                },
                "function": {
                    "biochemicalFunctions": { "evidenceCount": 1 },
                    "proteinInteractions": { "evidenceCount": 0 },
                    "expression": { "evidenceCount": 0 },
                    "pointsCounted": 0.5
                },
                "geneticEvidenceTotal": 0,
                "experimentalEvidenceTotal": 0.5,
                "evidencePointsTotal": 0.5
            }
        },
        "resourceParent": {
            "gdm": {
                "uuid": "gdm-0001",
                "gene": { "symbol": "FBN1", "hgncId": "HGNC:3603" },
                "disease": { "term": "Marfan syndrome", "diseaseId": "MONDO_0007947" },
                "modeInheritance": "Autosomal dominant inheritance (HP:0000006)",
                "annotations": [
                    {
                        "article": article("1852208"),
                        "experimentalData": [
                            biochemical_function(json!([owned_score("Score")])),
                            biochemical_function(json!([
                                { "affiliation": "10012", "scoreStatus": "Score" }
                            ]))
                        ]
                    }
                ]
            }
        }
    })
}

pub(super) fn store_response(embedded: Value) -> Value {
    json!({ "found": true, "_source": { "embedded": embedded } })
}

pub(super) fn registry() -> AffiliationRegistry {
    [
        (AFFILIATION.to_string(), "Hereditary Cancer GCEP".to_string()),
        ("10012".to_string(), "Brain Malformations GCEP".to_string()),
    ]
    .into_iter()
    .collect()
}

fn profile(bootstrap: &str, topic: &str) -> BrokerProfile {
    BrokerProfile {
        bootstrap_servers: bootstrap.to_string(),
        topic: topic.to_string(),
        tls: TlsFiles::in_dir("etc/certs"),
        key_password: String::new(),
    }
}

pub(super) fn routing() -> BrokerRouting {
    BrokerRouting {
        local_host: LOCAL_HOST.to_string(),
        production_host: PRODUCTION_HOST.to_string(),
        local: profile("localhost:9093", "test"),
        production: profile("exchange.clinicalgenome.org:9093", "gene_validity"),
        other: profile("exchange.clinicalgenome.org:9093", "gene_validity_dev"),
    }
}

pub(super) fn delivery_config(timeout: Duration) -> DeliveryConfig {
    DeliveryConfig {
        timeout,
        routing: routing(),
    }
}

/// Renders `template` against `document` with no aggregated evidence.
pub(super) fn render_with(
    template: Value,
    document: &Value,
    evidence: &EvidenceIndex,
    counts: Value,
) -> Map<String, Value> {
    let template = MessageTemplate::from_value(&template).expect("template parses");
    let registry = registry();
    let context = RenderContext {
        document,
        evidence,
        counts: &counts,
        affiliations: &registry,
    };
    template.render(&context).expect("template renders")
}

/// Fails when any object, array, or string in `value` is empty.
pub(super) fn assert_no_empty_sections(path: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            assert!(!map.is_empty(), "empty section at {path}");
            for (key, child) in map {
                assert_no_empty_sections(&format!("{path}.{key}"), child);
            }
        }
        Value::Array(items) => {
            assert!(!items.is_empty(), "empty list at {path}");
            for (index, child) in items.iter().enumerate() {
                assert_no_empty_sections(&format!("{path}[{index}]"), child);
            }
        }
        Value::String(text) => assert!(!text.is_empty(), "empty string at {path}"),
        _ => {}
    }
}

pub(super) struct FakeStore {
    response: Result<Value, StoreError>,
    requests: Mutex<Vec<(String, String)>>,
}

impl FakeStore {
    pub(super) fn returning(response: Value) -> Self {
        Self {
            response: Ok(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn failing(error: StoreError) -> Self {
        Self {
            response: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().expect("store mutex poisoned").clone()
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn fetch(&self, doc_type: &str, id: &str) -> Result<Value, StoreError> {
        self.requests
            .lock()
            .expect("store mutex poisoned")
            .push((doc_type.to_string(), id.to_string()));
        self.response.clone()
    }
}

#[derive(Debug, Clone)]
pub(super) enum BrokerBehaviour {
    Acknowledge(DeliveryReceipt),
    Reject(BrokerError),
    NeverAcknowledge,
}

pub(super) struct RecordingBroker {
    behaviour: BrokerBehaviour,
    deliveries: Mutex<Vec<(BrokerTarget, String)>>,
}

impl RecordingBroker {
    pub(super) fn new(behaviour: BrokerBehaviour) -> Self {
        Self {
            behaviour,
            deliveries: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn acknowledging() -> Self {
        Self::new(BrokerBehaviour::Acknowledge(DeliveryReceipt {
            partition: 2,
            offset: 41,
        }))
    }

    pub(super) fn deliveries(&self) -> Vec<(BrokerTarget, String)> {
        self.deliveries.lock().expect("broker mutex poisoned").clone()
    }
}

#[async_trait]
impl MessageBroker for RecordingBroker {
    async fn deliver(
        &self,
        target: &BrokerTarget,
        payload: &str,
    ) -> Result<DeliveryReceipt, BrokerError> {
        self.deliveries
            .lock()
            .expect("broker mutex poisoned")
            .push((target.clone(), payload.to_string()));

        match &self.behaviour {
            BrokerBehaviour::Acknowledge(receipt) => Ok(*receipt),
            BrokerBehaviour::Reject(error) => Err(error.clone()),
            BrokerBehaviour::NeverAcknowledge => std::future::pending().await,
        }
    }
}

pub(super) fn build_publisher(
    store: FakeStore,
    broker: RecordingBroker,
    timeout: Duration,
) -> (
    MessagePublisher<FakeStore, RecordingBroker>,
    Arc<FakeStore>,
    Arc<RecordingBroker>,
) {
    let store = Arc::new(store);
    let broker = Arc::new(broker);
    let template = Arc::new(MessageTemplate::gci_to_dx().expect("bundled template parses"));
    let publisher = MessagePublisher::new(
        store.clone(),
        broker.clone(),
        template,
        Arc::new(registry()),
        &delivery_config(timeout),
    );
    (publisher, store, broker)
}
