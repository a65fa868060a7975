use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::affiliation::AffiliationRegistry;
use super::broker::{BrokerError, BrokerTarget, DeliveryReceipt, MessageBroker};
use super::evidence::{aggregate, evidence_counts, EvidenceError};
use super::path::{is_truthy, resolve};
use super::store::{DocumentStore, StoreError};
use super::template::{MessageTemplate, RenderContext, RenderError};
use crate::config::{BrokerRouting, DeliveryConfig};

const CLASSIFICATION_POINTS: [&str; 4] = ["_source", "embedded", "resource", "classificationPoints"];

/// Query parameters accepted by the publish endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PublishRequest {
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub uuid: Option<String>,
}

impl PublishRequest {
    pub fn new(doc_type: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            doc_type: Some(doc_type.into()),
            uuid: Some(uuid.into()),
        }
    }
}

/// Steps a publish request moves through; failures are reported against one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    ValidateRequest,
    FetchDocument,
    BuildEvidence,
    RenderTemplate,
    Serialize,
    Publish,
}

impl PublishStage {
    pub fn label(self) -> &'static str {
        match self {
            PublishStage::ValidateRequest => "validate_request",
            PublishStage::FetchDocument => "fetch_document",
            PublishStage::BuildEvidence => "build_evidence",
            PublishStage::RenderTemplate => "render_template",
            PublishStage::Serialize => "serialize",
            PublishStage::Publish => "publish",
        }
    }
}

/// Failure while turning an embedded document into a message.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("classification points are missing or not a mapping")]
    PointsNotMapping,
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BuildError {
    pub fn stage(&self) -> PublishStage {
        match self {
            BuildError::PointsNotMapping | BuildError::Evidence(_) => PublishStage::BuildEvidence,
            BuildError::Render(_) => PublishStage::RenderTemplate,
            BuildError::Serialize(_) => PublishStage::Serialize,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("request is missing type or uuid")]
    MissingParameters,
    #[error(transparent)]
    FetchFailed(StoreError),
    #[error("store response is not JSON: {0}")]
    MalformedResponse(String),
    #[error("store reported the document as not found")]
    NotFound,
    #[error("store response has no classification points")]
    IncompleteSource,
    #[error(transparent)]
    BuildFailed(#[from] BuildError),
    #[error(transparent)]
    PublishFailed(#[from] BrokerError),
    #[error("no delivery acknowledgement within {0:?}")]
    DeliveryTimeout(Duration),
}

impl From<StoreError> for PublishError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Malformed(detail) => Self::MalformedResponse(detail),
            other => Self::FetchFailed(other),
        }
    }
}

impl PublishError {
    /// Message reported to the caller in the `Fail` status object.
    pub fn message(&self) -> String {
        let message = match self {
            PublishError::MissingParameters => "Required parameters missing in request",
            PublishError::FetchFailed(StoreError::Status(_)) => "Data search failed",
            PublishError::FetchFailed(_) => "Data search could not be completed",
            PublishError::MalformedResponse(_) => "Retrieved data not in expected format",
            PublishError::NotFound => "Requested data could not be found",
            PublishError::IncompleteSource => "Retrieved data missing expected elements",
            PublishError::BuildFailed(_) => "Failed to build complete message",
            PublishError::PublishFailed(BrokerError::Delivery(detail)) => return detail.clone(),
            PublishError::PublishFailed(BrokerError::Unavailable(_)) => "Message delivery failed",
            PublishError::DeliveryTimeout(_) => "Unable to deliver message",
        };
        message.to_string()
    }

    pub fn stage(&self) -> PublishStage {
        match self {
            PublishError::MissingParameters => PublishStage::ValidateRequest,
            PublishError::FetchFailed(_)
            | PublishError::MalformedResponse(_)
            | PublishError::NotFound
            | PublishError::IncompleteSource => PublishStage::FetchDocument,
            PublishError::BuildFailed(err) => err.stage(),
            PublishError::PublishFailed(_) | PublishError::DeliveryTimeout(_) => {
                PublishStage::Publish
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PublishStatus {
    Success,
    Fail,
}

/// Status object returned for every publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub status: PublishStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl PublishOutcome {
    pub fn success(message: String, receipt: DeliveryReceipt) -> Self {
        Self {
            status: PublishStatus::Success,
            message,
            partition: Some(receipt.partition),
            offset: Some(receipt.offset),
        }
    }

    pub fn failure(error: &PublishError) -> Self {
        Self {
            status: PublishStatus::Fail,
            message: error.message(),
            partition: None,
            offset: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PublishStatus::Success
    }
}

/// A message that reached the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub message: String,
    pub target: BrokerTarget,
    pub receipt: DeliveryReceipt,
}

/// Checks the store envelope and returns the embedded document.
pub fn embedded_document(response: &Value) -> Result<&Value, PublishError> {
    if !response.get("found").is_some_and(is_truthy) {
        return Err(PublishError::NotFound);
    }

    resolve(response, &CLASSIFICATION_POINTS).ok_or(PublishError::IncompleteSource)?;
    resolve(response, &CLASSIFICATION_POINTS[..2]).ok_or(PublishError::IncompleteSource)
}

/// Aggregates evidence, reduces the counts, and renders `template` for one
/// embedded document.
pub fn build_message(
    embedded: &Value,
    template: &MessageTemplate,
    affiliations: &AffiliationRegistry,
) -> Result<Map<String, Value>, BuildError> {
    let points = resolve(embedded, &["resource", "classificationPoints"])
        .and_then(Value::as_object)
        .ok_or(BuildError::PointsNotMapping)?;

    let evidence = aggregate(embedded)?;
    let counts = Value::Object(evidence_counts(points));
    debug!(
        categories = evidence.categories().count(),
        "aggregated evidence"
    );

    let context = RenderContext {
        document: embedded,
        evidence: &evidence,
        counts: &counts,
        affiliations,
    };
    Ok(template.render(&context)?)
}

/// Compact serialization preserving template key order.
pub fn serialize_message(message: &Map<String, Value>) -> Result<String, BuildError> {
    Ok(serde_json::to_string(message)?)
}

/// Fetches a classification, builds its message, and delivers it to the broker
/// selected by the inbound host.
pub struct MessagePublisher<S, B> {
    store: Arc<S>,
    broker: Arc<B>,
    template: Arc<MessageTemplate>,
    affiliations: Arc<AffiliationRegistry>,
    routing: BrokerRouting,
    delivery_timeout: Duration,
}

impl<S, B> MessagePublisher<S, B>
where
    S: DocumentStore + 'static,
    B: MessageBroker + 'static,
{
    pub fn new(
        store: Arc<S>,
        broker: Arc<B>,
        template: Arc<MessageTemplate>,
        affiliations: Arc<AffiliationRegistry>,
        delivery: &DeliveryConfig,
    ) -> Self {
        Self {
            store,
            broker,
            template,
            affiliations,
            routing: delivery.routing.clone(),
            delivery_timeout: delivery.timeout,
        }
    }

    pub fn routing(&self) -> &BrokerRouting {
        &self.routing
    }

    pub fn target_for_host(&self, host: &str) -> BrokerTarget {
        let deployment = self.routing.deployment_for_host(host);
        BrokerTarget {
            deployment,
            topic: self.routing.profile(deployment).topic.clone(),
        }
    }

    /// Runs the request to completion and folds any failure into a `Fail` outcome.
    pub async fn publish(&self, request: &PublishRequest, host: &str) -> PublishOutcome {
        match self.try_publish(request, host).await {
            Ok(published) => {
                info!(
                    deployment = published.target.deployment.label(),
                    topic = %published.target.topic,
                    partition = published.receipt.partition,
                    offset = published.receipt.offset,
                    "message published"
                );
                PublishOutcome::success(published.message, published.receipt)
            }
            Err(err) => {
                warn!(stage = err.stage().label(), error = %err, "publish failed");
                PublishOutcome::failure(&err)
            }
        }
    }

    pub async fn try_publish(
        &self,
        request: &PublishRequest,
        host: &str,
    ) -> Result<Published, PublishError> {
        debug!(stage = PublishStage::ValidateRequest.label());
        let (Some(doc_type), Some(uuid)) = (&request.doc_type, &request.uuid) else {
            return Err(PublishError::MissingParameters);
        };

        debug!(stage = PublishStage::FetchDocument.label(), doc_type = %doc_type, uuid = %uuid);
        let response = self.store.fetch(doc_type, uuid).await?;
        let embedded = embedded_document(&response)?;

        debug!(stage = PublishStage::BuildEvidence.label());
        let rendered = build_message(embedded, &self.template, &self.affiliations)?;

        debug!(stage = PublishStage::Serialize.label());
        let message = serialize_message(&rendered)?;

        let target = self.target_for_host(host);
        debug!(
            stage = PublishStage::Publish.label(),
            deployment = target.deployment.label(),
            topic = %target.topic
        );
        let receipt = tokio::time::timeout(
            self.delivery_timeout,
            self.broker.deliver(&target, &message),
        )
        .await
        .map_err(|_| PublishError::DeliveryTimeout(self.delivery_timeout))??;

        Ok(Published {
            message,
            target,
            receipt,
        })
    }
}
