//! Logging and OpenTelemetry tracing setup.
//!
//! The subscriber is assembled from three layers:
//! - an `EnvFilter` (from `RUST_LOG`, otherwise [`DEFAULT_DIRECTIVES`])
//! - a `fmt` layer, JSON when `otel.json_logs` is set
//! - an OTLP/gRPC span exporter, only when `otel.enabled` is set
//!
//! Spans opened by the handlers and services (`http.send_message`,
//! `conversation.start`, `notification.list`, ...) carry the user and entity
//! ids they operate on, so exported traces line up with the JSON log lines.

use opentelemetry::trace::TracerProvider;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::OtelConfig;

/// Filter used when `RUST_LOG` is unset; sqlx statement logging is noisy at info
pub const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn";

pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to build OTLP exporter: {0}")]
    ExporterBuild(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Keeps the tracer provider alive; flushes pending spans on drop.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            // The subscriber may already be torn down at this point
            eprintln!("Failed to flush OpenTelemetry spans: {e}");
        }
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_telemetry(config: &OtelConfig) -> TelemetryResult<TelemetryGuard> {
    let provider = config.enabled.then(|| build_provider(config)).transpose()?;

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    let fmt_layer = if config.json_logs {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))?;

    tracing::info!(
        service_name = %config.service_name,
        otel_enabled = config.enabled,
        otel_endpoint = config.enabled.then_some(config.endpoint.as_str()),
        sampling_ratio = config.sampling_ratio,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { provider })
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

fn build_provider(config: &OtelConfig) -> TelemetryResult<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.endpoint)
        .build()
        .map_err(|e| TelemetryError::ExporterBuild(e.to_string()))?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(sampler_for(config.sampling_ratio))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource(config))
        .build())
}

fn resource(config: &OtelConfig) -> Resource {
    Resource::new([
        KeyValue::new(SERVICE_NAME, config.service_name.clone()),
        KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ])
}

fn sampler_for(ratio: f64) -> Sampler {
    match ratio {
        r if r >= 1.0 => Sampler::AlwaysOn,
        r if r <= 0.0 => Sampler::AlwaysOff,
        r => Sampler::TraceIdRatioBased(r),
    }
}
