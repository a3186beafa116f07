//! Node registration HTTP surface
//!
//! | route                        | body                                        |
//! |------------------------------|---------------------------------------------|
//! | `POST /nodes/ws/register`    | `{id, name, addr, port, secret, hostname}`  |
//! | `POST /nodes/ws/unregister`  | `{id, secret}`                              |
//! | `POST /nodes/ws/update`      | `{id, secret}`                              |
//! | `GET  /nodes/ws/nodes`       | none                                        |
//!
//! Every response body is a JSON object with a single `op` field.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::directory::{DirectoryError, DirectoryStore, NodeDirectory, NodeId};

/// Largest request body accepted
const MAX_BODY_SIZE: usize = 64 * 1024;

pub const MISSING_JSON: &str = "Missing JSON.";
pub const MISSING_REQUIRED_JSON: &str = "Missing required JSON keys.";
pub const INVALID_JSON: &str = "Invalid JSON keys.";
pub const UNAUTHORIZED: &str = "Unauthorized.";
pub const VOID: &str = "void";

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    id: NodeId,
    name: String,
    addr: String,
    port: u16,
    secret: String,
    hostname: String,
}

#[derive(Debug, Deserialize)]
struct NodeRequest {
    id: NodeId,
    secret: String,
}

/// Status and JSON body of a reply
pub type ApiReply = (StatusCode, Value);

fn op(status: StatusCode, value: impl Into<Value>) -> ApiReply {
    (status, json!({ "op": value.into() }))
}

/// Request handlers over a node directory
pub struct NodeApi<S> {
    directory: Arc<NodeDirectory<S>>,
}

impl<S: DirectoryStore> NodeApi<S> {
    pub fn new(directory: Arc<NodeDirectory<S>>) -> Self {
        Self { directory }
    }

    /// Route a request to its handler
    pub async fn handle(&self, method: &Method, path: &str, body: &[u8]) -> ApiReply {
        match (method, path) {
            (&Method::POST, "/nodes/ws/register") => self.register(body).await,
            (&Method::POST, "/nodes/ws/unregister") => self.unregister(body).await,
            (&Method::POST, "/nodes/ws/update") => self.update(body).await,
            (&Method::GET, "/nodes/ws/nodes") => self.nodes().await,
            (
                _,
                "/nodes/ws/register" | "/nodes/ws/unregister" | "/nodes/ws/update" | "/nodes/ws/nodes",
            ) => op(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed."),
            _ => op(StatusCode::NOT_FOUND, "URL not found."),
        }
    }

    async fn register(&self, body: &[u8]) -> ApiReply {
        let req: RegisterRequest = match parse_body(
            body,
            &["id", "name", "addr", "port", "secret", "hostname"],
        ) {
            Ok(req) => req,
            Err(reply) => return reply,
        };

        let address = format!("{}:{}", req.addr, req.port);
        tracing::debug!(node_id = req.id, name = %req.name, address = %address, "Node register request");

        match self
            .directory
            .register(&req.secret, req.id, &address, &req.hostname)
            .await
        {
            Ok(_) => op(StatusCode::OK, "Added"),
            Err(e) => directory_error(e),
        }
    }

    async fn unregister(&self, body: &[u8]) -> ApiReply {
        let req: NodeRequest = match parse_body(body, &["id", "secret"]) {
            Ok(req) => req,
            Err(reply) => return reply,
        };

        match self.directory.unregister(&req.secret, req.id).await {
            Ok(_) => op(StatusCode::OK, "Removed"),
            Err(e) => directory_error(e),
        }
    }

    async fn update(&self, body: &[u8]) -> ApiReply {
        let req: NodeRequest = match parse_body(body, &["id", "secret"]) {
            Ok(req) => req,
            Err(reply) => return reply,
        };

        match self.directory.update(&req.secret, req.id).await {
            Ok(_) => op(StatusCode::OK, "Removed from available nodes"),
            Err(e) => directory_error(e),
        }
    }

    async fn nodes(&self) -> ApiReply {
        match self.directory.list().await {
            Ok(nodes) if nodes.is_empty() => op(StatusCode::OK, VOID),
            Ok(nodes) => op(StatusCode::OK, nodes),
            Err(e) => directory_error(e),
        }
    }

    /// Serve one hyper request
    pub async fn serve_request(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let (status, body) = match Limited::new(req.into_body(), MAX_BODY_SIZE).collect().await {
            Ok(collected) => self.handle(&method, &path, &collected.to_bytes()).await,
            Err(e) => {
                tracing::debug!(method = %method, path = %path, error = %e, "Failed to read request body");
                op(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large.")
            }
        };

        tracing::debug!(method = %method, path = %path, status = status.as_u16(), "HTTP request");
        json_response(status, &body)
    }
}

/// Decode a JSON object body after checking its required keys
fn parse_body<T: DeserializeOwned>(body: &[u8], required: &[&str]) -> Result<T, ApiReply> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value @ Value::Object(_)) => value,
        _ => return Err(op(StatusCode::BAD_REQUEST, MISSING_JSON)),
    };

    if !required.iter().all(|key| value.get(key).is_some()) {
        return Err(op(StatusCode::BAD_REQUEST, MISSING_REQUIRED_JSON));
    }

    serde_json::from_value(value).map_err(|_| op(StatusCode::BAD_REQUEST, INVALID_JSON))
}

fn directory_error(e: DirectoryError) -> ApiReply {
    match e {
        DirectoryError::Unauthorized => op(StatusCode::UNAUTHORIZED, UNAUTHORIZED),
        DirectoryError::EmptySecret => {
            tracing::error!("Node directory has no secret configured");
            op(StatusCode::INTERNAL_SERVER_ERROR, "Something happened internally.")
        }
        DirectoryError::Store(e) => {
            tracing::error!(error = %e, "Node directory store failure");
            op(StatusCode::INTERNAL_SERVER_ERROR, "Something happened internally.")
        }
    }
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Accept HTTP connections until cancelled
pub async fn serve<S: DirectoryStore>(
    listener: TcpListener,
    api: Arc<NodeApi<S>>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Node API listening");

    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept HTTP connection");
                    continue;
                }
            },
        };

        spawn_connection(stream, peer_addr, Arc::clone(&api), shutdown.clone());
    }
}

fn spawn_connection<S: DirectoryStore>(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    api: Arc<NodeApi<S>>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let service = service_fn(move |req| {
            let api = Arc::clone(&api);
            async move { Ok::<_, Infallible>(api.serve_request(req).await) }
        });

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(peer = %peer_addr, error = %e, "HTTP connection error");
                }
            }
            _ = shutdown.cancelled() => {
                connection.as_mut().graceful_shutdown();
                let _ = connection.await;
            }
        }
    });
}
