//! I define the server bootstrap: listener resolution, tls,
//! and graceful shutdown.
//!

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{error, info, warn};

use crate::config::{AppConfig, TlsFailurePolicy};

/// Extra grace past the drain timeout before the process is
/// forcibly terminated.
const FORCED_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Resolve the socket address for given network kind and
/// `[host]:port` address. A bare `:port` binds all interfaces
/// of the network's family; port `0` asks for an ephemeral
/// port.
pub fn resolve_listen_addr(network: &str, addr: &str) -> anyhow::Result<SocketAddr> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("Listen address {addr:?} has no port."))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid port in listen address {addr:?}."))?;

    let ip: IpAddr = if host.is_empty() {
        match network {
            "tcp6" => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    } else {
        host.trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .with_context(|| format!("Invalid host in listen address {addr:?}."))?
    };
    Ok(SocketAddr::new(ip, port))
}

/// Serve given router per given configuration, until a
/// shutdown signal drains it.
pub async fn serve(config: &AppConfig, app: Router) -> anyhow::Result<()> {
    let http = &config.server.http;
    let addr = resolve_listen_addr(&http.network, &http.addr)?;
    let drain = Duration::from_secs(http.shutdown_timeout);

    let handle = Handle::new();
    tokio::spawn(log_bound_addr(handle.clone()));
    tokio::spawn(shutdown_on_signal(handle.clone(), drain));

    if http.tls.enabled {
        match RustlsConfig::from_pem_file(&http.tls.cert_file, &http.tls.key_file).await {
            Ok(rustls_config) => {
                info!("Tls enabled.");
                axum_server::bind_rustls(addr, rustls_config)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await?;
                return Ok(());
            }
            Err(e) => match http.tls.on_load_failure {
                TlsFailurePolicy::Fail => {
                    return Err(anyhow::Error::from(e)
                        .context("Error in loading tls certificate/key."));
                }
                TlsFailurePolicy::FallbackHttp => {
                    error!("Error in loading tls certificate/key. {}", e);
                    warn!("Falling back to plain http, as configured.");
                }
            },
        }
    }

    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

/// Log the actually-bound address, so ephemeral-port runs are
/// discoverable.
async fn log_bound_addr(handle: Handle) {
    if let Some(addr) = handle.listening().await {
        info!("Listening on {}.", addr);
    }
}

/// Initiate graceful shutdown on SIGTERM/SIGINT, draining
/// active requests up to the configured timeout. A safety
/// timer forcibly terminates the process shortly after, if the
/// drain stalls.
async fn shutdown_on_signal(handle: Handle, drain: Duration) {
    wait_for_signal().await;
    info!(
        "Shutdown signal received; draining requests for up to {:?}.",
        drain
    );
    handle.graceful_shutdown(Some(drain));

    tokio::time::sleep(drain + FORCED_EXIT_GRACE).await;
    error!("Drain did not complete in time; terminating.");
    std::process::exit(1);
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("Signal handler must install.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

// ----------------------------------------
//                                      tests
// ----------------------------------------
