use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use s3relay::app_state::{AppState, OpsState};
use s3relay::auth::source_from_settings;
use s3relay::config::Config;
use s3relay::proxy::{DnsReverseLookup, IdentityValidator, build_client};
use s3relay::server::{TlsFiles, create_app, create_ops_app, serve};
use s3relay::metrics;
use s3relay::types::{BuildInfo, ProxyTarget, error::ProxyError};

/// Grace period for in-flight requests during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// s3relay: signing reverse proxy for S3-compatible object stores
#[derive(Parser, Debug)]
#[command(name = "s3relay")]
#[command(about = "Signs and forwards tenant requests to an S3-compatible object store", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config/config.json")]
    config: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => {
            tracing::info!("loaded configuration from {}", cli.config);
            config
        }
        Err(e) => {
            tracing::error!("could not parse config file '{}': {e}", cli.config);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!("could not start the server: {e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), ProxyError> {
    let prometheus = metrics::install_recorder()?;

    let svc = &config.service_settings;
    let s3 = &config.s3_settings;

    let credentials = source_from_settings(s3).await?;
    let client = build_client(
        svc.max_conns_per_host,
        Duration::from_secs(svc.response_header_timeout_secs),
    )?;

    let validator = if svc.request_validation {
        let lookup = Arc::new(DnsReverseLookup::from_system_conf()?);
        Some(Arc::new(IdentityValidator::new(
            svc.request_validation_expected_name_suffix.clone(),
            lookup,
        )))
    } else {
        None
    };

    let target = ProxyTarget {
        scheme: s3.scheme.clone(),
        endpoint: s3.endpoint.clone(),
        bucket: s3.bucket.clone(),
        region: s3.region.clone(),
    };
    tracing::info!(bucket = target.bucket, host = target.host(), "proxying to upstream");

    let state = AppState {
        client,
        credentials,
        target,
        validator,
        installation_id_segment: svc.installation_id_path_segment,
        response_header_allow_list: svc.response_header_allow_list.clone(),
    };
    let ops_state = OpsState {
        build: BuildInfo::from_build_env(),
        prometheus,
    };

    // Both addresses already passed Config::validate.
    let addr = svc
        .host
        .parse()
        .map_err(|e| ProxyError::Config(format!("invalid service host: {e}")))?;
    let metrics_addr = svc
        .metrics_host
        .parse()
        .map_err(|e| ProxyError::Config(format!("invalid metrics host: {e}")))?;
    let tls = (!svc.tls_cert_file.is_empty()).then(|| TlsFiles {
        cert_file: svc.tls_cert_file.clone(),
        key_file: svc.tls_key_file.clone(),
    });

    let handle = axum_server::Handle::new();
    let proxy_server = tokio::spawn(serve(create_app(state), addr, tls, handle.clone()));
    let ops_server = tokio::spawn(serve(
        create_ops_app(ops_state),
        metrics_addr,
        None,
        handle.clone(),
    ));
    tracing::info!("listening on {} (ops on {})", svc.host, svc.metrics_host);

    shutdown_signal().await;
    tracing::info!(
        "shutting down, allowing {}s for in-flight requests",
        SHUTDOWN_GRACE.as_secs()
    );
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));

    for task in [proxy_server, ops_server] {
        match task.await {
            Ok(result) => result?,
            Err(e) => return Err(ProxyError::Internal(format!("server task failed: {e}"))),
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("could not install SIGINT handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("could not install SIGTERM handler")
            .recv()
            .await;
    };
    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
