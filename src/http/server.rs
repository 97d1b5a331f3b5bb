//! HTTP serving layer: the proxy executor (C9, §4.9).
//!
//! # Design Decisions
//! - [`GatewayState`] splits long-lived subsystems (coordination-backed rate
//!   limiter, circuit breaker registry, health registry) from [`Snapshot`],
//!   the structural config (routes, backends, security/retry/timeout
//!   settings) rebuilt wholesale and swapped atomically on reload (§5).
//!   Breaker and health-check tuning are fixed at startup, not
//!   hot-reloaded: re-tuning failure detection mid-flight is a restart, not
//!   a reload.
//! - A single `axum::Router<GatewayState>` is built once; there is no
//!   per-reload router rebuild or fallback-delegation layer. Handlers read
//!   the current `Snapshot` out of the `ArcSwap` on every request.
//! - Request bodies are always buffered up to `security.max_body_size`
//!   before the first upstream attempt, so the same bytes can be replayed
//!   across retries and candidate failover without re-reading the client
//!   connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use axum_server::Handle;
use http::{header, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::config::ProxyConfig;
use crate::context::{Principal, RateLimitOutcome, RequestContext};
use crate::coordination;
use crate::error::{insert_rate_limit_headers, GatewayError};
use crate::health::active::HealthRegistry;
use crate::introspection;
use crate::lifecycle::Shutdown;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::pool::BackendManager;
use crate::net::tls::load_tls_config;
use crate::observability::events::{emit, ObservationEvent};
use crate::observability::metrics as obs_metrics;
use crate::rate_limit::{admit, AdmissionDecision, RateLimitEngine};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::retries::{is_retryable, RetryBudget};
use crate::routing::Router as RouteRouter;
use crate::transform::{apply_request_transform, apply_response_transform, client_ip_from_chain};
use crate::{admin, auth};

type HyperClient = Client<HttpConnector, Body>;

/// Everything a config reload rebuilds wholesale (§5).
pub struct Snapshot {
    pub config: ProxyConfig,
    pub router: RouteRouter,
    pub backends: BackendManager,
}

impl Snapshot {
    fn build(config: ProxyConfig) -> Result<Self, String> {
        let router = RouteRouter::from_config(&config.routes)?;
        let backends = BackendManager::new(&config.backends, &config.health_check);
        Ok(Self { config, router, backends })
    }
}

/// State shared by every axum handler. Cheap to clone; every clone sees the
/// same long-lived subsystems and the same swapped snapshot.
#[derive(Clone)]
pub struct GatewayState {
    pub snapshot: Arc<ArcSwap<Snapshot>>,
    pub client: HyperClient,
    pub rate_limit_engine: Arc<RateLimitEngine>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub health: Arc<HealthRegistry>,
    pub retry_budget: Arc<RetryBudget>,
    pub scheme: &'static str,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    config: ProxyConfig,
    state: GatewayState,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Build every subsystem and connect to the coordination store. Async
    /// because the coordination connect attempt (§5) runs at construction
    /// time, before any listener is bound.
    pub async fn new(config: ProxyConfig, shutdown: Shutdown) -> Result<Self, String> {
        let snapshot = Snapshot::build(config.clone())?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let store = coordination::connect(&config.coordination).await;
        let rate_limit_engine = Arc::new(RateLimitEngine::new(store, config.coordination.key_prefix.clone()));
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));
        let health = Arc::new(HealthRegistry::new(config.health_check.clone()));
        let retry_budget = Arc::new(RetryBudget::new(config.retries.budget_ratio, 100));
        let scheme = if config.listener.tls.is_some() { "https" } else { "http" };

        let state = GatewayState {
            snapshot: Arc::new(ArcSwap::from_pointee(snapshot)),
            client,
            rate_limit_engine,
            breakers,
            health,
            retry_budget,
            scheme,
        };

        Ok(Self { config, state, shutdown })
    }

    /// Run the server, accepting connections on the given listener until
    /// shutdown fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.state.health.spawn_all(self.state.snapshot.load().backends.all_backends(), self.shutdown.sender());

        let reload_state = self.state.clone();
        let reload_shutdown_sender = self.shutdown.sender().clone();
        let mut reload_shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(new_config) = config_updates.recv() => {
                        match Snapshot::build(new_config) {
                            Ok(snapshot) => {
                                reload_state.health.spawn_all(snapshot.backends.all_backends(), &reload_shutdown_sender);
                                reload_state.snapshot.store(Arc::new(snapshot));
                                tracing::info!("configuration reload applied");
                            }
                            Err(e) => tracing::error!(error = %e, "rejected invalid configuration reload, keeping current snapshot"),
                        }
                    }
                    _ = reload_shutdown.recv() => {
                        tracing::info!("config reloader received shutdown signal, exiting loop");
                        break;
                    }
                    else => break,
                }
            }
        });

        if self.config.admin.enabled {
            spawn_admin_listener(self.state.clone(), self.config.admin.clone(), self.shutdown.clone());
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        let app = Router::new()
            .route("/healthz", get(introspection::liveness))
            .route("/readyz", get(introspection::readiness))
            .route("/status", get(introspection::status))
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .layer(DefaultBodyLimit::max(self.config.security.max_body_size))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
            .into_make_service_with_connect_info::<SocketAddr>();

        if let Some(ref tls_config) = self.config.listener.tls {
            tracing::info!("TLS enabled, loading certificates");
            let cert_path = std::path::Path::new(&tls_config.cert_path);
            let key_path = std::path::Path::new(&tls_config.key_path);
            let tls_config = load_tls_config(cert_path, key_path).await?;

            let handle = Handle::new();
            let h = handle.clone();
            let drain_shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("HTTPS server initiating graceful shutdown");
                h.graceful_shutdown(Some(Duration::from_secs(10)));
                drain_shutdown.notify_drained();
            });

            axum_server::from_tcp_rustls(listener.into_std()?, tls_config).handle(handle).serve(app).await?;
        } else {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    tracing::info!("HTTP server initiating graceful shutdown");
                })
                .await?;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn spawn_admin_listener(state: GatewayState, admin_config: crate::config::AdminConfig, shutdown: Shutdown) {
    tokio::spawn(async move {
        let listener = match TcpListener::bind(&admin_config.bind_address).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, address = %admin_config.bind_address, "failed to bind admin listener");
                return;
            }
        };
        tracing::info!(address = %admin_config.bind_address, "admin server starting");
        let app = admin::setup_admin_router(state, admin_config);
        let mut shutdown_rx = shutdown.subscribe();
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
        {
            tracing::error!(error = %e, "admin server exited with error");
        }
    });
}

fn is_websocket_upgrade(headers: &http::HeaderMap) -> bool {
    let has_upgrade_token = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("upgrade"))
        .unwrap_or(false);
    let wants_websocket = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    has_upgrade_token && wants_websocket
}

fn content_length(headers: &http::HeaderMap) -> u64 {
    headers.get(header::CONTENT_LENGTH).and_then(|v| v.to_str().ok()).and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Build the outgoing request to `backend_url` carrying `path_and_query`,
/// reusing the (already transformed) inbound method/headers and a buffered
/// body.
fn build_outgoing_request(
    parts: &http::request::Parts,
    backend_url: &str,
    path_and_query: &str,
    body: bytes::Bytes,
) -> Result<Request<Body>, String> {
    let uri: http::Uri = format!("{}{}", backend_url.trim_end_matches('/'), path_and_query)
        .parse()
        .map_err(|e| format!("invalid backend uri: {e}"))?;

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri).version(parts.version);
    if let Some(headers) = builder.headers_mut() {
        *headers = parts.headers.clone();
    }
    builder.body(Body::from(body)).map_err(|e| format!("failed to build upstream request: {e}"))
}

fn build_backend_ws_url(backend_url: &str, path_and_query: &str) -> Result<url::Url, String> {
    let mut url = url::Url::parse(&format!("{}{}", backend_url.trim_end_matches('/'), path_and_query))
        .map_err(|e| format!("invalid backend url: {e}"))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme).map_err(|_| "failed to set websocket scheme".to_string())?;
    Ok(url)
}

/// The proxy executor (C9). Implements §4.9's eight-step sequence:
/// request id + request-transform, bypass/rate-limit admission, candidate
/// resolution, health/breaker-gated attempt with retry and failover,
/// response-transform, and observation emission.
async fn proxy_handler(
    State(state): State<GatewayState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Response {
    let start = Instant::now();
    let snapshot = state.snapshot.load_full();
    let config = &snapshot.config;

    let (mut parts, body) = req.into_parts();
    let host = parts.headers.get(header::HOST).and_then(|v| v.to_str().ok()).unwrap_or("").to_string();
    let path = parts.uri.path().to_string();
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_else(|| path.clone());

    let forwarded_for = parts.headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()).map(str::to_string);
    let client_ip = client_ip_from_chain(peer.ip(), forwarded_for.as_deref(), &config.security.trusted_proxies);

    // Auth resolution runs ahead of rate limiting, not as axum middleware:
    // the REDESIGN FLAG calls for this ordering to be explicit, and a plain
    // function call at the top of the handler is the most explicit shape.
    let principal: Option<Principal> = auth::resolve_principal(&parts.headers);
    let api_key = auth::extract_api_key(&parts.headers);

    let request_id =
        apply_request_transform(&mut parts.headers, &config.security, principal.as_ref(), client_ip, state.scheme, &host);

    let method = parts.method.clone();
    let bytes_in = content_length(&parts.headers);

    let mut ctx = RequestContext {
        request_id: request_id.clone(),
        client_ip,
        method: method.clone(),
        path: path.clone(),
        headers: parts.headers.clone(),
        principal,
        api_key,
        started_at: start,
        rate_limit: None,
    };

    let admission = admit(&config.rate_limit, &state.rate_limit_engine, &ctx).await;
    let denied_response = match &admission {
        AdmissionDecision::Bypassed { reason } => {
            obs_metrics::record_rate_limit("bypass", true, true);
            tracing::debug!(request_id = %request_id, reason = %reason, "rate limit bypassed");
            None
        }
        AdmissionDecision::Checked(result) => {
            obs_metrics::record_rate_limit(result.algorithm, result.allowed, false);
            ctx.rate_limit = Some(RateLimitOutcome {
                allowed: result.allowed,
                bypassed: false,
                limit: result.limit,
                remaining: result.remaining,
                reset_at: result.reset_at,
                algorithm: Some(result.algorithm),
            });
            if result.allowed {
                None
            } else {
                Some(GatewayError::RateLimit {
                    limit: result.limit,
                    remaining: result.remaining,
                    reset_at: result.reset_at,
                    retry_after: result.retry_after.unwrap_or(1),
                })
            }
        }
    };

    if let Some(err) = denied_response {
        let mut response = err.into_response_with_id(&request_id, config.security.redact_errors);
        apply_response_transform(response.headers_mut(), &config.security);
        emit(&ObservationEvent::new(
            &ctx,
            response.status().as_u16(),
            start.elapsed(),
            None,
            bytes_in,
            0,
            Some("rate_limit_exceeded".to_string()),
        ));
        return response;
    }

    let host_filter = Some(host.as_str()).filter(|h| !h.is_empty());
    let candidates = snapshot.router.resolve(host_filter, &path);
    if candidates.is_empty() {
        let mut response = GatewayError::NotFound.into_response_with_id(&request_id, config.security.redact_errors);
        apply_response_transform(response.headers_mut(), &config.security);
        emit(&ObservationEvent::new(&ctx, response.status().as_u16(), start.elapsed(), None, bytes_in, 0, Some("no_route".to_string())));
        return response;
    }

    // Rate limiting and the breaker apply to the upgrade request; individual
    // frames afterwards are exempt (§4.9).
    if is_websocket_upgrade(&parts.headers) {
        return handle_websocket(state, snapshot, candidates, parts, path_and_query, ctx, start, bytes_in).await;
    }

    let body_bytes = match axum::body::to_bytes(body, config.security.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let mut response =
                GatewayError::Validation(format!("body too large or unreadable: {e}")).into_response_with_id(&request_id, config.security.redact_errors);
            apply_response_transform(response.headers_mut(), &config.security);
            emit(&ObservationEvent::new(&ctx, response.status().as_u16(), start.elapsed(), None, bytes_in, 0, Some("validation_error".to_string())));
            return response;
        }
    };
    state.retry_budget.record_request();

    let retry_config = &config.retries;
    let mut last_error: Option<String> = None;

    for backend_name in &candidates {
        let Some(backend): Option<Arc<Backend>> = snapshot.backends.get(backend_name) else { continue };
        if !backend.is_healthy() {
            continue;
        }
        if let Err(denied) = state.breakers.can_request(backend_name) {
            tracing::debug!(request_id = %request_id, backend = %backend_name, retry_after_ms = denied.retry_after_ms, "circuit open, trying next candidate");
            last_error = Some("circuit open".to_string());
            continue;
        }
        let Some(_guard) = snapshot.backends.acquire(backend_name) else {
            last_error = Some("backend at connection capacity".to_string());
            continue;
        };

        let timeout = Duration::from_secs(backend.timeout_secs.unwrap_or(config.timeouts.request_secs).max(1));
        let attempt_limit = if retry_config.enabled { backend.retries.unwrap_or(retry_config.max_attempts) } else { 0 };

        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            let outgoing = match build_outgoing_request(&parts, &backend.url, &path_and_query, body_bytes.clone()) {
                Ok(req) => req,
                Err(e) => break Err(e),
            };

            let round_trip = tokio::time::timeout(timeout, state.client.request(outgoing)).await;
            let (transient, response_or_none, error_desc) = match round_trip {
                Ok(Ok(resp)) => {
                    let transient = retry_config.retry_on_5xx && resp.status().is_server_error();
                    (transient, Some(resp), None)
                }
                Ok(Err(e)) => (true, None, Some(e.to_string())),
                Err(_) => (true, None, Some("request timed out".to_string())),
            };

            if !transient {
                state.breakers.record_outcome(backend_name, true);
                break Ok(response_or_none.expect("non-transient outcome always carries a response"));
            }

            state.breakers.record_outcome(backend_name, false);
            last_error = error_desc.clone().or_else(|| response_or_none.as_ref().map(|r| format!("status {}", r.status())));

            let retryable = is_retryable(&method, response_or_none.as_ref().map(|r| r.status()), response_or_none.is_none());
            if attempt <= attempt_limit && retryable && state.retry_budget.can_retry() {
                obs_metrics::record_retry(backend_name);
                let backoff = calculate_backoff(attempt, retry_config.base_delay_ms, retry_config.max_delay_ms);
                tracing::info!(request_id = %request_id, backend = %backend_name, attempt, delay = ?backoff, "retrying upstream attempt");
                tokio::time::sleep(backoff).await;
                continue;
            }

            break Err(error_desc.unwrap_or_else(|| {
                response_or_none.map(|r| format!("upstream returned {}", r.status())).unwrap_or_else(|| "upstream failure".to_string())
            }));
        };

        match outcome {
            Ok(resp) => {
                let status = resp.status();
                let (resp_parts, resp_body) = resp.into_parts();
                let mut response = Response::from_parts(resp_parts, Body::new(resp_body));
                apply_response_transform(response.headers_mut(), &config.security);
                if let Some(rl) = &ctx.rate_limit {
                    insert_rate_limit_headers(response.headers_mut(), rl.limit, rl.remaining, rl.reset_at);
                }
                let bytes_out = content_length(response.headers());
                obs_metrics::record_request(method.as_str(), status.as_u16(), backend_name, start);
                emit(&ObservationEvent::new(&ctx, status.as_u16(), start.elapsed(), Some(backend_name.clone()), bytes_in, bytes_out, None));
                return response;
            }
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    let mut response = GatewayError::Upstream(last_error.unwrap_or_else(|| "no backend available".to_string()))
        .into_response_with_id(&request_id, config.security.redact_errors);
    apply_response_transform(response.headers_mut(), &config.security);
    obs_metrics::record_request(method.as_str(), response.status().as_u16(), "none", start);
    emit(&ObservationEvent::new(&ctx, response.status().as_u16(), start.elapsed(), None, bytes_in, 0, Some("proxy_error".to_string())));
    response
}

/// Candidate selection is identical to the plain-HTTP path; only the
/// terminal action (hijack vs. round-trip) differs. Failover across
/// candidates stops once bytes start flowing through the upgraded
/// connection, so only the first serviceable candidate is tried.
async fn handle_websocket(
    state: GatewayState,
    snapshot: Arc<Snapshot>,
    candidates: Vec<String>,
    mut parts: http::request::Parts,
    path_and_query: String,
    ctx: RequestContext,
    start: Instant,
    bytes_in: u64,
) -> Response {
    let chosen = candidates.iter().find_map(|name| {
        let backend = snapshot.backends.get(name)?;
        if backend.is_healthy() && state.breakers.can_request(name).is_ok() {
            Some((name.clone(), backend))
        } else {
            None
        }
    });

    let Some((backend_name, backend)) = chosen else {
        let mut response =
            GatewayError::Upstream("no backend available for websocket upgrade".to_string()).into_response_with_id(&ctx.request_id, true);
        apply_response_transform(response.headers_mut(), &snapshot.config.security);
        emit(&ObservationEvent::new(&ctx, response.status().as_u16(), start.elapsed(), None, bytes_in, 0, Some("proxy_error".to_string())));
        return response;
    };

    let ws_upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let backend_url = match build_backend_ws_url(&backend.url, &path_and_query) {
        Ok(url) => url,
        Err(e) => {
            state.breakers.record_outcome(&backend_name, false);
            let mut response = GatewayError::Upstream(e).into_response_with_id(&ctx.request_id, true);
            apply_response_transform(response.headers_mut(), &snapshot.config.security);
            emit(&ObservationEvent::new(&ctx, response.status().as_u16(), start.elapsed(), Some(backend_name), bytes_in, 0, Some("proxy_error".to_string())));
            return response;
        }
    };

    state.breakers.record_outcome(&backend_name, true);
    let response = crate::http::websocket::handle_ws_upgrade(ws_upgrade, backend_url).into_response();
    emit(&ObservationEvent::new(&ctx, response.status().as_u16(), start.elapsed(), Some(backend_name), bytes_in, 0, None));
    response
}
