//! Node HTTP API over a real socket

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use chat_fanout::directory::{MemoryDirectoryStore, NodeDirectory};
use chat_fanout::http::{self, NodeApi};
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

const SECRET: &str = "s3cret";

async fn start_api() -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let directory = Arc::new(NodeDirectory::open(MemoryDirectoryStore::new(), SECRET).unwrap());
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(http::serve(
        listener,
        Arc::new(NodeApi::new(directory)),
        shutdown.clone(),
    ));
    (addr, shutdown, task)
}

async fn call(addr: SocketAddr, method: Method, path: &str, body: &str) -> (StatusCode, Value) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = Request::builder()
        .method(method)
        .uri(path)
        .header("host", "localhost")
        .header("connection", "close")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();

    let res = sender.send_request(req).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

fn register_body(id: u64, hostname: &str) -> String {
    json!({
        "id": id,
        "name": format!("node-{id}"),
        "addr": "10.0.0.1",
        "port": 9000,
        "secret": SECRET,
        "hostname": hostname,
    })
    .to_string()
}

#[tokio::test]
async fn test_node_lifecycle_over_http() {
    let (addr, shutdown, task) = start_api().await;

    assert_eq!(
        call(addr, Method::GET, "/nodes/ws/nodes", "").await,
        (StatusCode::OK, json!({"op": "void"}))
    );

    assert_eq!(
        call(addr, Method::POST, "/nodes/ws/register", &register_body(1, "a.chat")).await,
        (StatusCode::OK, json!({"op": "Added"}))
    );
    call(addr, Method::POST, "/nodes/ws/register", &register_body(2, "b.chat")).await;

    assert_eq!(
        call(addr, Method::GET, "/nodes/ws/nodes", "").await,
        (StatusCode::OK, json!({"op": ["a.chat", "b.chat"]}))
    );

    let node_1 = json!({"id": 1, "secret": SECRET}).to_string();
    assert_eq!(
        call(addr, Method::POST, "/nodes/ws/update", &node_1).await,
        (StatusCode::OK, json!({"op": "Removed from available nodes"}))
    );
    assert_eq!(
        call(addr, Method::GET, "/nodes/ws/nodes", "").await,
        (StatusCode::OK, json!({"op": ["b.chat"]}))
    );

    let node_2 = json!({"id": 2, "secret": SECRET}).to_string();
    assert_eq!(
        call(addr, Method::POST, "/nodes/ws/unregister", &node_2).await,
        (StatusCode::OK, json!({"op": "Removed"}))
    );
    assert_eq!(
        call(addr, Method::GET, "/nodes/ws/nodes", "").await,
        (StatusCode::OK, json!({"op": "void"}))
    );

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_http_errors() {
    let (addr, shutdown, task) = start_api().await;

    assert_eq!(
        call(addr, Method::POST, "/nodes/ws/register", "").await,
        (StatusCode::BAD_REQUEST, json!({"op": "Missing JSON."}))
    );
    assert_eq!(
        call(addr, Method::POST, "/nodes/ws/update", r#"{"id": 1}"#).await,
        (StatusCode::BAD_REQUEST, json!({"op": "Missing required JSON keys."}))
    );
    assert_eq!(
        call(addr, Method::POST, "/nodes/ws/update", r#"{"id": "one", "secret": "s3cret"}"#).await,
        (StatusCode::BAD_REQUEST, json!({"op": "Invalid JSON keys."}))
    );
    assert_eq!(
        call(addr, Method::POST, "/nodes/ws/update", r#"{"id": 1, "secret": "nope"}"#).await,
        (StatusCode::UNAUTHORIZED, json!({"op": "Unauthorized."}))
    );

    let (status, _) = call(addr, Method::GET, "/nodes/ws/elsewhere", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    shutdown.cancel();
    task.await.unwrap().unwrap();
}
