//! Gene-validity Data Exchange messaging.
//!
//! A classification is fetched from the document store, its evidence is grouped by
//! category, and the bundled template is rendered into a compact JSON message that
//! is delivered to the broker chosen by the inbound host.

pub mod affiliation;
pub mod broker;
pub mod evidence;
pub mod path;
pub mod publisher;
pub mod router;
pub mod store;
pub mod template;

#[cfg(test)]
mod tests;

pub use affiliation::{AffiliationError, AffiliationRegistry};
pub use broker::{BrokerError, BrokerTarget, DeliveryReceipt, MessageBroker};
pub use evidence::{
    aggregate, evidence_counts, EvidenceError, EvidenceIndex, PointsTotal, PublicationSummary,
};
pub use path::{resolve, DataPath};
pub use publisher::{
    build_message, embedded_document, serialize_message, BuildError, MessagePublisher,
    PublishError, PublishOutcome, PublishRequest, PublishStage, PublishStatus, Published,
};
pub use router::publish_router;
pub use store::{DocumentStore, HttpDocumentStore, StoreError};
pub use template::{MessageTemplate, RenderContext, RenderError, TemplateError};

#[cfg(feature = "kafka")]
pub use broker::KafkaBroker;
