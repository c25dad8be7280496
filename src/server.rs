//! HTTP front for wallet snapshots
//!
//! One route: `GET /{address}` returns the [`WalletSnapshot`] JSON. Every
//! request gets a child of the server's cancellation token that also fires
//! when the request deadline elapses, which stops the fetch pipeline and
//! returns a partial snapshot with the unfetched signatures listed.
//!
//! [`WalletSnapshot`]: crate::wallet::WalletSnapshot

use {
    crate::{
        fetch::FetchError,
        wallet::{WalletAssembler, WalletError, WalletSnapshot},
    },
    http_body_util::{combinators::BoxBody, BodyExt, Empty, Full},
    hyper::{
        body::{Bytes, Incoming},
        header::{HeaderValue, CONTENT_TYPE},
        server::conn::http1,
        service::service_fn,
        Method, Request, Response, StatusCode,
    },
    hyper_util::rt::TokioIo,
    std::{net::SocketAddr, sync::Arc, time::Duration},
    tokio::{net::TcpListener, select, task::JoinHandle},
    tokio_util::sync::CancellationToken,
};

type ResponseBody = BoxBody<Bytes, hyper::Error>;

/// Shared state for request handlers
pub struct ServerState {
    pub assembler: WalletAssembler,
    pub request_deadline: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Route {
    Wallet(String),
    MethodNotAllowed,
    NotFound,
}

/// Map a request line to a route; `/{address}` is the only resource
pub fn route(method: &Method, path: &str) -> Route {
    let segment = match path.strip_prefix('/') {
        Some(rest) if !rest.is_empty() && !rest.contains('/') => rest,
        _ => return Route::NotFound,
    };

    if *method != Method::GET {
        return Route::MethodNotAllowed;
    }

    Route::Wallet(segment.to_string())
}

/// HTTP status for a failed snapshot
pub fn error_status(err: &WalletError) -> StatusCode {
    match err {
        WalletError::InvalidAddress { .. } | WalletError::Fetch(FetchError::InvalidAddress { .. }) => {
            StatusCode::BAD_REQUEST
        }
        WalletError::Fetch(FetchError::SignatureListing(_)) | WalletError::Rpc { .. } => {
            StatusCode::BAD_GATEWAY
        }
        WalletError::Fetch(FetchError::Cancelled) => StatusCode::SERVICE_UNAVAILABLE,
        WalletError::Price(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Bind `addr` and serve until `cancel` fires
pub async fn run_server(
    addr: SocketAddr,
    state: Arc<ServerState>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("🌐 Wallet server listening on http://{}", listener.local_addr()?);
    serve(listener, state, cancel).await;
    Ok(())
}

/// Accept loop over an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<ServerState>, cancel: CancellationToken) {
    loop {
        select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let io = TokioIo::new(stream);
                    let state = state.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |req| handle(req, state.clone(), cancel.clone()));
                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            log::debug!("Connection from {} closed: {}", peer, e);
                        }
                    });
                }
                Err(e) => log::error!("❌ Failed to accept connection: {}", e),
            },
        }
    }

    log::info!("🛑 Wallet server stopped");
}

async fn handle(
    req: Request<Incoming>,
    state: Arc<ServerState>,
    cancel: CancellationToken,
) -> Result<Response<ResponseBody>, hyper::Error> {
    let response = match route(req.method(), req.uri().path()) {
        Route::Wallet(address) => wallet_response(&state, &address, &cancel).await,
        Route::MethodNotAllowed => error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        Route::NotFound => error_response(StatusCode::NOT_FOUND, "not found"),
    };

    // Drain the request body so the connection can be reused
    let mut body = req.into_body();
    while body.frame().await.is_some() {}

    Ok(response)
}

async fn wallet_response(
    state: &ServerState,
    address: &str,
    cancel: &CancellationToken,
) -> Response<ResponseBody> {
    let request_cancel = cancel.child_token();
    // Cancels the pipeline if the client goes away and hyper drops this future
    let _guard = request_cancel.clone().drop_guard();

    let deadline = arm_deadline(request_cancel.clone(), state.request_deadline);
    let result = state.assembler.snapshot(address, request_cancel.clone()).await;
    deadline.abort();

    snapshot_response(address, result)
}

/// Cancel `token` once `after` elapses, unless it is cancelled first
fn arm_deadline(token: CancellationToken, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(after) => {
                log::warn!("⏰ Request deadline of {:?} reached, returning partial history", after);
                token.cancel();
            }
        }
    })
}

/// A snapshot cut short by the deadline is still a 200; its `pending`
/// lists what was left unfetched
fn snapshot_response(
    address: &str,
    result: Result<WalletSnapshot, WalletError>,
) -> Response<ResponseBody> {
    match result {
        Ok(snapshot) => match serde_json::to_vec(&snapshot) {
            Ok(body) => json_response(StatusCode::OK, body),
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        },
        Err(e) => {
            log::warn!("⚠️  Snapshot for {} failed: {}", address, e);
            error_response(error_status(&e), &e.to_string())
        }
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response<ResponseBody> {
    let mut response = Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    match serde_json::to_vec(&serde_json::json!({ "error": message })) {
        Ok(body) => json_response(status, body),
        Err(_) => {
            let mut response = Response::new(empty());
            *response.status_mut() = status;
            response
        }
    }
}

fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}
