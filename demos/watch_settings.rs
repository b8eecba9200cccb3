//! Example watching a shared service settings value for changes.
//!
//! This example shows how to:
//! - Build a watcher from loaded settings
//! - Watch a subject and react to nested changes
//! - Start, stop and dispose the background poller
//!
//! Run with: cargo run --example watch_settings

use deepwatch::prelude::*;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct ServiceSettings {
    name: String,
    port: u16,
    upstreams: Vec<String>,
    limits: Limits,
}

#[derive(Debug, Serialize)]
struct Limits {
    requests_per_second: f64,
    burst: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Watch Settings Example ===\n");

    // Falls back to defaults when no file or env vars are present
    let settings = WatcherSettings::loader()
        .with_env_overrides("DEEPWATCH", "__")
        .load()?;
    let watcher = Watcher::builder()
        .with_settings(&settings)
        .with_poll_interval(Duration::from_millis(50))
        .build()?;
    println!("Watcher: {:?}\n", watcher);

    let service = Subject::new(Value::from_serialize(&ServiceSettings {
        name: "api".to_string(),
        port: 8080,
        upstreams: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
        limits: Limits {
            requests_per_second: 100.0,
            burst: 20,
        },
    })?);

    watcher.watch(&service, |subject| {
        let value = subject.read();
        println!(
            "  -> change detected: port={:?} rps={:?} upstreams={}",
            value.get("port").and_then(Value::as_i64),
            value.pointer("/limits/requests_per_second").and_then(Value::as_f64),
            value.get("upstreams").and_then(Value::as_list).map_or(0, |l| l.len()),
        );
    })?;
    watcher.start()?;

    println!("--- Changing port ---");
    service.update(|value| value.insert("port", 9090));
    tokio::time::sleep(Duration::from_millis(120)).await;

    println!("--- Changing a nested limit ---");
    service.update(|value| {
        if let Some(rps) = value.pointer_mut("/limits/requests_per_second") {
            *rps = Value::from(250.0);
        }
    });
    tokio::time::sleep(Duration::from_millis(120)).await;

    println!("--- Rewriting with an equal value (no callback) ---");
    let current = service.get();
    service.set(current);
    tokio::time::sleep(Duration::from_millis(120)).await;

    println!("--- Stopping the poller, then adding an upstream ---");
    watcher.stop();
    service.update(|value| {
        if let Some(Value::List(upstreams)) = value.get_mut("upstreams") {
            upstreams.push(Value::from("10.0.0.3"));
        }
    });
    tokio::time::sleep(Duration::from_millis(120)).await;

    println!("--- Manual tick picks up the pending change ---");
    let report = watcher.poll_once();
    println!("  tick report: {:?}\n", report);

    let removed = watcher.dispose();
    println!("Disposed watcher, removed {} watch(es)", removed);

    Ok(())
}
