use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use gci_dx::messaging::{publish_router, DocumentStore, MessageBroker, MessagePublisher};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_publish_routes<S, B>(publisher: Arc<MessagePublisher<S, B>>) -> axum::Router
where
    S: DocumentStore + 'static,
    B: MessageBroker + 'static,
{
    publish_router(publisher)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::DisconnectedBroker;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use gci_dx::config::{BrokerProfile, BrokerRouting, DeliveryConfig, TlsFiles};
    use gci_dx::messaging::{AffiliationRegistry, MessageTemplate, StoreError};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tower::ServiceExt;

    const FIXTURE: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../crates/gci-dx/tests/fixtures/store_response.json"
    ));

    struct StaticStore(Value);

    #[async_trait]
    impl DocumentStore for StaticStore {
        async fn fetch(&self, _doc_type: &str, _id: &str) -> Result<Value, StoreError> {
            Ok(self.0.clone())
        }
    }

    fn empty_store() -> StaticStore {
        StaticStore(json!({ "found": false }))
    }

    fn routing() -> BrokerRouting {
        let profile = |topic: &str| BrokerProfile {
            bootstrap_servers: "localhost:9093".to_string(),
            topic: topic.to_string(),
            tls: TlsFiles::in_dir("etc/certs"),
            key_password: String::new(),
        };
        BrokerRouting {
            local_host: "localhost:6543".to_string(),
            production_host: "curation.clinicalgenome.org".to_string(),
            local: profile("test"),
            production: profile("gene_validity"),
            other: profile("gene_validity_dev"),
        }
    }

    fn app(ready: bool) -> axum::Router {
        app_with(empty_store(), ready)
    }

    fn app_with(store: StaticStore, ready: bool) -> axum::Router {
        let publisher = MessagePublisher::new(
            Arc::new(store),
            Arc::new(DisconnectedBroker),
            Arc::new(MessageTemplate::gci_to_dx().expect("bundled template parses")),
            Arc::new(AffiliationRegistry::default()),
            &DeliveryConfig {
                timeout: Duration::from_secs(1),
                routing: routing(),
            },
        );
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_publish_routes(Arc::new(publisher)).layer(Extension(state))
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let (status, body) = get(app(false), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).expect("json"),
            json!({ "status": "ok" })
        );
    }

    #[tokio::test]
    async fn readiness_follows_the_startup_flag() {
        let (status, _) = get(app(false), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = get(app(true), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).expect("json"),
            json!({ "status": "ready" })
        );
    }

    #[tokio::test]
    async fn publish_route_is_mounted() {
        let (status, body) = get(app(true), "/publish?type=provisional_classification&uuid=x").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).expect("json"),
            json!({ "status": "Fail", "message": "Requested data could not be found" })
        );
    }

    #[tokio::test]
    async fn complete_documents_fail_delivery_without_a_transport() {
        let response: Value = serde_json::from_str(FIXTURE).expect("fixture is JSON");
        let (status, body) = get(
            app_with(StaticStore(response), true),
            "/publish?type=provisional_classification&uuid=5b0a1f2e-6f6a-4d3c-9f4e-2a7f0c1d9e01",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::from_slice::<Value>(&body).expect("json"),
            json!({ "status": "Fail", "message": "Message delivery failed" })
        );
    }
}
