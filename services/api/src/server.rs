use crate::cli::ServeArgs;
use crate::infra::{service_broker, AppState};
use crate::routes::with_publish_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use gci_dx::config::AppConfig;
use gci_dx::error::AppError;
use gci_dx::messaging::{
    AffiliationRegistry, HttpDocumentStore, MessagePublisher, MessageTemplate,
};
use gci_dx::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let template = Arc::new(MessageTemplate::gci_to_dx()?);
    let affiliations = Arc::new(AffiliationRegistry::from_path(&config.affiliations_path)?);
    info!(
        path = %config.affiliations_path.display(),
        affiliations = affiliations.len(),
        "loaded affiliation registry"
    );

    let store = Arc::new(HttpDocumentStore::from_config(&config.store)?);
    let broker = Arc::new(service_broker(&config.delivery.routing));
    let publisher = Arc::new(MessagePublisher::new(
        store,
        broker,
        template,
        affiliations,
        &config.delivery,
    ));

    let app = with_publish_routes(publisher)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, store = %config.store.base_url, "data exchange publisher ready");

    axum::serve(listener, app).await?;
    Ok(())
}
