//! HTTP boundary: accept loop and the /wol wake handler

use crate::config::{Config, Machine, WakeConfig};
use crate::error::text_response;
use crate::probe::StatusProbe;
use crate::resolver::HostResolver;
use crate::wol::{MacAddr, MagicPacket};
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Pause after a failed UDP transmit so the wake loop cannot spin tightly
/// when the local network is down (a failed send returns immediately,
/// unlike a failed probe which blocks for its timeout).
const TRANSMIT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Immutable per-process gateway state, shared across request tasks.
///
/// Built once from the validated configuration; request handlers only ever
/// read from it, so no locking is needed.
pub struct GatewayState {
    resolver: HostResolver,
    machines: HashMap<String, Machine>,
    wake: WakeConfig,
    probe: StatusProbe,
}

impl GatewayState {
    pub fn from_config(config: &Config) -> anyhow::Result<Arc<Self>> {
        let resolver = HostResolver::new(&config.services)?;
        let probe = StatusProbe::new(config.wake.probe_timeout())?;
        Ok(Arc::new(Self {
            resolver,
            machines: config.machines.clone(),
            wake: config.wake.clone(),
            probe,
        }))
    }
}

/// The gateway HTTP server
pub struct GatewayServer {
    bind_addr: SocketAddr,
    state: Arc<GatewayState>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    pub fn new(
        bind_addr: SocketAddr,
        state: Arc<GatewayState>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bind_addr,
            state,
            shutdown_rx,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "Gateway listening");

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, state).await {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Gateway shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    state: Arc<GatewayState>,
) -> anyhow::Result<()> {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let state = Arc::clone(&state);
        async move { handle_request(req, state).await }
    });

    AutoBuilder::new(TokioExecutor::new())
        .serve_connection(io, service)
        .await
        .map_err(|e| anyhow::anyhow!("connection error: {e}"))?;

    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<GatewayState>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
    if req.uri().path() != "/wol" {
        return Ok(text_response(StatusCode::NOT_FOUND, "Not found.\n"));
    }

    if req.method() != Method::GET && req.method() != Method::POST {
        return Ok(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed.\n",
        ));
    }

    // The Host header is taken verbatim: no port-stripping, no lowercasing.
    // Patterns in the services table are written against the literal value.
    let host = match req
        .headers()
        .get(hyper::header::HOST)
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h.to_string(),
        None => {
            warn!("Request without Host header, not sending WOL packet");
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                "No Host header found. Not sending WOL packet.",
            ));
        }
    };

    let machine_id = match state.resolver.resolve(&host) {
        Some(id) => id.to_string(),
        None => {
            warn!(host, "Host matches no configured service, not sending WOL packet");
            return Ok(text_response(
                StatusCode::NOT_FOUND,
                format!("Host {host} not in services. Not sending WOL packet."),
            ));
        }
    };

    // Resolver targets are checked against the machine table at load, so a
    // miss here means the state was built from an unvalidated config.
    let machine = match state.machines.get(&machine_id) {
        Some(m) => m,
        None => {
            error!(host, machine = machine_id, "Resolved machine has no record");
            return Ok(text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Machine configuration not found.",
            ));
        }
    };

    let (mac, broadcast_ip) = match (machine.mac_addr(), machine.broadcast_addr()) {
        (Ok(mac), Ok(ip)) => (mac, ip),
        (mac, ip) => {
            if let Err(e) = mac {
                error!(machine = machine_id, error = %e, "Invalid MAC in machine record");
            }
            if let Err(e) = ip {
                error!(machine = machine_id, error = %e, "Invalid broadcast_ip in machine record");
            }
            return Ok(text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Machine configuration invalid.",
            ));
        }
    };

    match wake_machine(&state, &machine_id, machine, mac, broadcast_ip).await {
        WakeOutcome::Awake => Ok(text_response(
            StatusCode::OK,
            format!("Woke up {machine_id}"),
        )),
        WakeOutcome::AttemptsExhausted(attempts) => {
            warn!(machine = machine_id, attempts, "Gave up waiting for machine to wake");
            Ok(text_response(
                StatusCode::GATEWAY_TIMEOUT,
                format!("Timed out waking {machine_id}."),
            ))
        }
    }
}

enum WakeOutcome {
    Awake,
    AttemptsExhausted(u32),
}

/// The wake loop: broadcast a magic packet, probe the status endpoint,
/// repeat until the machine answers.
///
/// With no `max_attempts` configured the loop is unbounded and the request
/// is held open until the machine becomes reachable; pacing comes only from
/// the probe timeout. A permanently unreachable machine therefore pins one
/// connection task per stuck request.
async fn wake_machine(
    state: &GatewayState,
    machine_id: &str,
    machine: &Machine,
    mac: MacAddr,
    broadcast_ip: Ipv4Addr,
) -> WakeOutcome {
    let packet = MagicPacket::new(&mac);
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        info!(
            machine = machine_id,
            mac = %mac,
            broadcast = %broadcast_ip,
            attempt = attempts,
            "Sending WOL packet"
        );

        if let Err(e) = packet.send(broadcast_ip, state.wake.wol_port).await {
            warn!(machine = machine_id, error = %e, "Failed to send WOL packet");
            tokio::time::sleep(TRANSMIT_RETRY_DELAY).await;
        }

        if state.probe.is_awake(&machine.status_url).await {
            info!(machine = machine_id, attempts, "Machine woke up");
            return WakeOutcome::Awake;
        }

        if let Some(max) = state.wake.max_attempts {
            if attempts >= max {
                return WakeOutcome::AttemptsExhausted(attempts);
            }
        }
    }
}
