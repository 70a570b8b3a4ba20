/* src/main.rs */

use fancy_log::{LogLevel, log, set_log_level};
use lazy_motd::lazy_motd;
use route_r::{Reply, Request, Router, Server, ServerConfig};
use serde_json::json;
use std::env;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let level = env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase();
    let log_level = match level.as_str() {
        "debug" => LogLevel::Debug,
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        _ => LogLevel::Info,
    };
    set_log_level(log_level);
    lazy_motd!();

    let mut router = Router::new();
    router
        .get("/", |_: &Request| {
            Some(Reply::json(json!({"message": "Hello, World!", "status": "success"})))
        })?
        .get("/health", |_: &Request| Some(Reply::json(json!({"status": "healthy"}))))?
        .get("/user/:country/:id/view", |req: &Request| {
            Some(Reply::json(json!({"params": req.params()})))
        })?
        .get("/report/:name", |req: &Request| {
            let name = req.param("name")?;
            Some(Reply::text("id,total\n1,42\n").download_as(format!("{name}.csv")))
        })?
        .get("/home", |_: &Request| Some(Reply::redirect("/")))?
        .post("/echo", |req: &Request| {
            Some(Reply::json(json!({"echo": format!("{:?}", req.body())})))
        })?
        .on("/ping", |req: &Request| {
            Some(Reply::text(format!("pong ({})", req.method())).with_header("X-Served-By", "route-r"))
        })?;

    let mut server = Server::with_config(router, config);
    let addr = server.start_from_config().await?;
    log(
        LogLevel::Info,
        &format!("Try: curl http://{}/user/in/42/view?tag=x", addr),
    );

    signal::ctrl_c().await?;
    log(LogLevel::Info, "Server shutting down...");
    server.stop().await;
    Ok(())
}
