use anyhow::Result;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Liveness/readiness probe server. Ready means the database is initialized.
#[derive(Clone)]
pub struct HealthServer {
    database_ready: Arc<AtomicBool>,
}

impl HealthServer {
    pub fn new() -> Self {
        Self {
            database_ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.database_ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.database_ready.load(Ordering::SeqCst)
    }

    pub async fn serve(&self, port: u16, ready_tx: oneshot::Sender<()>) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        info!(port = port, "Health server listening");
        let _ = ready_tx.send(());

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let response = respond(req.method(), req.uri().path(), server.is_ready());
                    async move { Ok::<_, Infallible>(response) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(
                        error = %err,
                        remote_addr = %remote_addr,
                        "Health server connection error"
                    );
                }
            });
        }
    }
}

impl Default for HealthServer {
    fn default() -> Self {
        Self::new()
    }
}

fn respond(method: &Method, path: &str, ready: bool) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/healthz") => text_response(StatusCode::OK, "ok"),
        (&Method::GET, "/readyz") if ready => text_response(StatusCode::OK, "ok"),
        (&Method::GET, "/readyz") => {
            text_response(StatusCode::SERVICE_UNAVAILABLE, "database not ready")
        }
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    }
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
