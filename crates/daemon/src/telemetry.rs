//! Tracing stack setup (fmt + optional OpenTelemetry)
//!
//! One registry, one `init()`: the OTLP export layer is composed into the
//! same subscriber as the fmt layer, not registered separately.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging for the daemon.
///
/// # Environment Variables
///
/// - `BACKFILL_LOG_FORMAT`: `pretty` (default) or `json`
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g. http://localhost:4317);
///   requires the `telemetry` build feature
/// - `OTEL_SERVICE_NAME`: Service name (default: backfill-daemon)
pub fn init_tracing() -> Result<()> {
    let log_format = std::env::var("BACKFILL_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("backfill=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            let stack = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json());
            #[cfg(feature = "telemetry")]
            stack.with(otel_layer()?).init();
            #[cfg(not(feature = "telemetry"))]
            stack.init();
        }
        _ => {
            // Development: pretty formatting with colors
            let stack = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty());
            #[cfg(feature = "telemetry")]
            stack.with(otel_layer()?).init();
            #[cfg(not(feature = "telemetry"))]
            stack.init();
        }
    }

    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        #[cfg(feature = "telemetry")]
        tracing::info!("OpenTelemetry export enabled");

        #[cfg(not(feature = "telemetry"))]
        {
            tracing::warn!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
            tracing::warn!("Rebuild with: cargo build --features telemetry");
        }
    }

    Ok(())
}

/// Build the OTLP export layer, `None` when no endpoint is configured
#[cfg(feature = "telemetry")]
fn otel_layer<S>() -> Result<
    Option<tracing_opentelemetry::OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>>,
>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    use opentelemetry::trace::TracerProvider;
    use opentelemetry_otlp::WithExportConfig;

    let endpoint = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => endpoint,
        Err(_) => return Ok(None),
    };

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "backfill-daemon".to_string());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(&endpoint),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?
        .tracer(service_name);

    Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer)))
}
