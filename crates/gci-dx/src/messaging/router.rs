use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::warn;

use super::broker::MessageBroker;
use super::publisher::{MessagePublisher, PublishError, PublishOutcome, PublishRequest};
use super::store::DocumentStore;

/// Router exposing the publish endpoint.
pub fn publish_router<S, B>(publisher: Arc<MessagePublisher<S, B>>) -> Router
where
    S: DocumentStore + 'static,
    B: MessageBroker + 'static,
{
    Router::new()
        .route("/publish", get(publish_handler::<S, B>))
        .with_state(publisher)
}

/// Always answers 200; failures are carried in the status object. A query
/// string that cannot be read is reported as missing parameters.
pub(crate) async fn publish_handler<S, B>(
    State(publisher): State<Arc<MessagePublisher<S, B>>>,
    query: Result<Query<PublishRequest>, QueryRejection>,
    headers: HeaderMap,
) -> Response
where
    S: DocumentStore + 'static,
    B: MessageBroker + 'static,
{
    let request = match query {
        Ok(Query(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable publish query");
            let outcome = PublishOutcome::failure(&PublishError::MissingParameters);
            return (StatusCode::OK, axum::Json(outcome)).into_response();
        }
    };

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let outcome = publisher.publish(&request, host).await;
    (StatusCode::OK, axum::Json(outcome)).into_response()
}
