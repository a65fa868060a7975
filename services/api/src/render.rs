use clap::Args;
use gci_dx::config::AppConfig;
use gci_dx::error::AppError;
use gci_dx::messaging::{
    build_message, embedded_document, serialize_message, AffiliationRegistry, MessageTemplate,
    PublishError,
};
use gci_dx::telemetry::{self, LogSink};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct RenderArgs {
    /// Saved document store response (`{found, _source: {embedded}}`)
    #[arg(long)]
    pub(crate) document: PathBuf,
    /// Template file to use instead of the bundled gci_to_dx template
    #[arg(long)]
    pub(crate) template: Option<PathBuf>,
    /// Affiliation registry file; defaults to DX_AFFILIATIONS_PATH
    #[arg(long)]
    pub(crate) affiliations: Option<PathBuf>,
    /// Pretty-print the message instead of the compact wire form
    #[arg(long, default_value_t = false)]
    pub(crate) pretty: bool,
}

pub(crate) fn run_render(args: RenderArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_sink(&config.telemetry, LogSink::Stderr)?;

    let rendered = render_document(&args, &config.affiliations_path)?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}

pub(crate) fn render_document(
    args: &RenderArgs,
    default_affiliations: &Path,
) -> Result<String, AppError> {
    let template = match &args.template {
        Some(path) => MessageTemplate::from_path(path)?,
        None => MessageTemplate::gci_to_dx()?,
    };
    let registry = AffiliationRegistry::from_path(
        args.affiliations.as_deref().unwrap_or(default_affiliations),
    )?;

    let raw = std::fs::read_to_string(&args.document)?;
    let response: Value = serde_json::from_str(&raw)?;
    let embedded = embedded_document(&response)?;
    let message = build_message(embedded, &template, &registry).map_err(PublishError::from)?;

    info!(
        document = %args.document.display(),
        affiliations = registry.len(),
        "rendered message"
    );

    let text = if args.pretty {
        serde_json::to_string_pretty(&message)?
    } else {
        serialize_message(&message).map_err(PublishError::from)?
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../../crates/gci-dx/tests/fixtures/store_response.json"
    );

    fn registry_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(
            br#"[{"affiliation_id": "10007", "affiliation_fullname": "Epilepsy GCEP"}]"#,
        )
        .expect("write registry");
        file
    }

    fn args(document: PathBuf, pretty: bool) -> RenderArgs {
        RenderArgs {
            document,
            template: None,
            affiliations: None,
            pretty,
        }
    }

    #[test]
    fn renders_fixture_in_compact_form() {
        let registry = registry_file();
        let rendered = render_document(&args(PathBuf::from(FIXTURE), false), registry.path())
            .expect("fixture renders");

        assert!(!rendered.contains('\n'));
        let message: Value = serde_json::from_str(&rendered).expect("output is JSON");
        assert_eq!(
            message["scoreJson"]["affiliation"]["name"],
            serde_json::json!("Epilepsy GCEP")
        );
    }

    #[test]
    fn pretty_output_spans_lines() {
        let registry = registry_file();
        let rendered = render_document(&args(PathBuf::from(FIXTURE), true), registry.path())
            .expect("fixture renders");
        assert!(rendered.starts_with("{\n"));
    }

    #[test]
    fn incomplete_documents_are_rejected() {
        let registry = registry_file();
        let mut document = tempfile::NamedTempFile::new().expect("temp file");
        document
            .write_all(br#"{"found": true, "_source": {"embedded": {"resource": {}}}}"#)
            .expect("write document");

        let err = render_document(&args(document.path().to_path_buf(), false), registry.path())
            .expect_err("classification points are required");
        assert!(matches!(err, AppError::Publish(PublishError::IncompleteSource)));
    }

    #[test]
    fn custom_templates_replace_the_bundled_one() {
        let registry = registry_file();
        let mut template = tempfile::NamedTempFile::new().expect("temp file");
        template
            .write_all(br#"{"id": ["$PATH_TO_DATA", "resource", "uuid"], "blank": ""}"#)
            .expect("write template");

        let render_args = RenderArgs {
            template: Some(template.path().to_path_buf()),
            ..args(PathBuf::from(FIXTURE), false)
        };
        let rendered = render_document(&render_args, registry.path()).expect("fixture renders");
        assert_eq!(rendered, r#"{"id":"5b0a1f2e-6f6a-4d3c-9f4e-2a7f0c1d9e01"}"#);
    }
}
