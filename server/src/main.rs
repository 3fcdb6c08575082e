use anyhow::{Context, Result};
use clap::Parser;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use slurk_server::{sweeper, Api, Server, ServerConfig, ValidatedConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative slurk game server")]
struct Args {
    /// YAML config file (defaults apply when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host interface to bind (overrides config and SLURK_HOST).
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Seed the server RNG for reproducible team draws.
    #[arg(long)]
    seed: Option<u64>,

    /// Credit winning bets when a round is settled.
    #[arg(long, default_value_t = false)]
    apply_payouts: bool,
}

fn build_config(args: &Args) -> Result<ValidatedConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.apply_payouts |= args.apply_payouts;
    Ok(config.validate()?)
}

fn init_tracing(level: Level) -> Result<()> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        });

    if let Some(endpoint) = endpoint {
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "slurk-server".to_string());
        let rate = std::env::var("OTEL_SAMPLING_RATE")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("failed to build OTLP exporter")?;
        let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(rate))
            .with_resource(
                opentelemetry_sdk::Resource::builder_empty()
                    .with_attributes([opentelemetry::KeyValue::new("service.name", service_name)])
                    .build(),
            )
            .with_batch_exporter(exporter)
            .build();
        let tracer = tracer_provider.tracer("slurk-server");
        opentelemetry::global::set_tracer_provider(tracer_provider);

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(LevelFilter::from_level(level)))
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .init();
    } else {
        tracing_subscriber::fmt().with_max_level(level).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;
    init_tracing(config.log_level)?;

    let webhook = config
        .webhook_url
        .clone()
        .map(sweeper::Webhook::new)
        .transpose()?;
    let addr = config.bind;
    let sweep_interval = config.sweep_interval;
    info!(
        %addr,
        apply_payouts = config.apply_payouts,
        retention_secs = config.retention.as_secs(),
        webhook = webhook.is_some(),
        "starting slurk server"
    );

    let server = Arc::new(Server::new(config));
    let _sweeper = sweeper::spawn(server.clone(), sweep_interval, webhook);
    let app = Api::new(server).router();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port: 9000\nseed: 1\nlog_level: debug").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = Args::parse_from([
            "slurk-server",
            "--config",
            &path,
            "--port",
            "9100",
            "--seed",
            "42",
            "--apply-payouts",
        ]);
        let config = build_config(&args).expect("config should build");
        assert_eq!(config.bind.port(), 9100);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.log_level, Level::DEBUG);
        assert!(config.apply_payouts);
    }

    #[test]
    fn test_rejects_bad_host() {
        let args = Args::parse_from(["slurk-server", "--host", "not-an-ip"]);
        let err = build_config(&args).unwrap_err();
        assert!(err.to_string().contains("host"), "unexpected error: {err}");
    }
}
