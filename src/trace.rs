use opentelemetry::{trace::TraceError, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
	runtime,
	trace::{BatchConfig, Sampler, Tracer},
	Resource,
};
use opentelemetry_semantic_conventions::{
	resource::{DEPLOYMENT_ENVIRONMENT, SERVICE_NAME, SERVICE_VERSION},
	SCHEMA_URL,
};
use tracing::{level_filters::LevelFilter, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Constructs a [`Resource`] which describes the service.
fn resource() -> Resource {
	Resource::from_schema_url(
		[
			KeyValue::new(SERVICE_NAME, env!("CARGO_PKG_NAME")),
			KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
			KeyValue::new(
				DEPLOYMENT_ENVIRONMENT,
				if cfg!(debug_assertions) {
					"development"
				} else {
					"production"
				},
			),
		],
		SCHEMA_URL,
	)
}

/// Constructs a batching OTLP [`Tracer`] that exports to `endpoint`.
fn init_tracer(endpoint: &str) -> Result<Tracer, TraceError> {
	opentelemetry_otlp::new_pipeline()
		.tracing()
		.with_trace_config(
			opentelemetry_sdk::trace::Config::default()
				.with_sampler(Sampler::AlwaysOn)
				.with_resource(resource()),
		)
		.with_batch_config(BatchConfig::default())
		.with_exporter(
			opentelemetry_otlp::new_exporter()
				.tonic()
				.with_endpoint(endpoint),
		)
		.install_batch(runtime::Tokio)
}

/// Installs the global subscriber: human-readable logs on stdout, plus span
/// export when an OTLP endpoint is configured.
///
/// Keep the returned guard alive for the lifetime of the process so pending
/// spans are flushed on shutdown.
pub fn init_tracing_subscriber(otlp_endpoint: Option<&str>) -> Result<OtelGuard, TraceError> {
	let tracer = otlp_endpoint.map(init_tracer).transpose()?;
	let exporting = tracer.is_some();

	tracing_subscriber::registry()
		.with(LevelFilter::from_level(Level::INFO))
		.with(tracing_subscriber::fmt::layer().with_ansi(true))
		.with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
		.init();

	Ok(OtelGuard { exporting })
}

pub struct OtelGuard {
	exporting: bool,
}

impl Drop for OtelGuard {
	fn drop(&mut self) {
		if self.exporting {
			opentelemetry::global::shutdown_tracer_provider();
		}
	}
}
