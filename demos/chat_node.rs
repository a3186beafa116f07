//! Single chat node with in-memory collaborators
//!
//! Run with: cargo run --example chat_node [CONFIG_JSON]
//!
//! Without a config file the node listens for WebSocket clients on
//! 0.0.0.0:9000 and serves the node API on 0.0.0.0:8080.
//!
//! Users 1, 2 and 3 share guild 1 and channel 10; their session tokens are
//! `token-1`, `token-2` and `token-3`. Connect with any WebSocket client:
//!
//!   websocat -H 'Author: 1' -H 'Authorization: token-1' ws://localhost:9000
//!
//! then send a frame such as:
//!
//!   event: new_message
//!   destination: 10
//!   destination_type: channel
//!   data: {"author": 1, "content": "hello"}
//!
//! Users 2 and 3, if connected, receive the event.

use chat_fanout::directory::MemoryDirectoryStore;
use chat_fanout::resolver::InMemoryMembership;
use chat_fanout::session::InMemorySessions;
use chat_fanout::{ChatNode, NodeConfig};

fn print_usage() {
    eprintln!("Usage: chat_node [CONFIG_JSON]");
    eprintln!();
    eprintln!("CONFIG_JSON is a JSON file with NodeConfig keys, for example:");
    eprintln!(r#"  {{"node_id": 1, "internal_secret": "s3cret", "advertise_addr": "127.0.0.1:9000"}}"#);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_fanout=debug".parse()?)
                .add_directive("chat_node=debug".parse()?),
        )
        .init();

    let config = match args.get(1) {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default()
            .node_id(1)
            .secret("demo-secret")
            .advertise("127.0.0.1:9000")
            .hostname("localhost"),
    };

    let membership = InMemoryMembership::new();
    let sessions = InMemorySessions::new();
    for user_id in 1..=3 {
        membership.add_guild_member(1, user_id);
        membership.add_channel_participant(10, user_id);
        sessions.insert_token(user_id, format!("token-{user_id}"));
    }

    println!("WebSocket clients: ws://{}", config.ws_bind_addr);
    println!("Node API:          http://{}/nodes/ws/nodes", config.api_bind_addr);
    println!();

    let node = ChatNode::new(config, membership, MemoryDirectoryStore::new(), sessions)?;
    let stats = node.stats();

    node.run_until(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Failed to listen for Ctrl+C: {}", e);
        }
    })
    .await?;

    let snapshot = stats.snapshot();
    println!(
        "Stats: events={} dropped={} deliveries={} failures={}",
        snapshot.events_received, snapshot.events_dropped, snapshot.deliveries, snapshot.delivery_failures
    );

    Ok(())
}
