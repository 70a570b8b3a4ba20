/* src/lib.rs */

use fancy_log::{LogLevel, log};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

mod config;
mod dispatch;
mod error;
mod pattern;
mod query;
mod request;
mod response;
mod router;

pub use config::{ServerConfig, parse_port};
pub use dispatch::{BodyLimits, Dispatcher};
pub use error::{DispatchError, RouteError, ServerError};
pub use pattern::{RoutePattern, compile};
pub use query::decode;
pub use request::{Body, Request};
pub use response::{Payload, Reply, Response, status_text};
pub use router::{Handler, HandlerFn, Method, RouteEntry, RouteMatch, Router};

/// Upper bound on the request line plus headers.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Unread input discarded after the response, so closing does not reset it.
const LINGER_BYTES: u64 = 64 * 1024;
const LINGER_TIMEOUT: Duration = Duration::from_millis(200);

/// A running accept loop.
struct Listening {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// HTTP server that routes every connection through a shared [`Router`].
pub struct Server {
    config: ServerConfig,
    router: Arc<RwLock<Router>>,
    listening: Option<Listening>,
}

impl Server {
    /// Creates a server with the default configuration.
    pub fn new(router: Router) -> Self {
        Self::with_config(router, ServerConfig::default())
    }

    /// Creates a server with an explicit configuration.
    pub fn with_config(router: Router, config: ServerConfig) -> Self {
        Self {
            config,
            router: Arc::new(RwLock::new(router)),
            listening: None,
        }
    }

    /// Gets the shared route table.
    pub fn router(&self) -> Arc<RwLock<Router>> {
        Arc::clone(&self.router)
    }

    /// Registers a route. Safe while the server is running.
    pub async fn route<H: Handler>(
        &self,
        method: Method,
        template: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        let mut router = self.router.write().await;
        router.route(method, template, handler)?;
        Ok(())
    }

    /// Registers a method-agnostic route. Safe while the server is running.
    pub async fn on<H: Handler>(&self, template: &str, handler: H) -> Result<(), RouteError> {
        let mut router = self.router.write().await;
        router.on(template, handler)?;
        Ok(())
    }

    /// Starts listening on the port from the configuration.
    pub async fn start_from_config(&mut self) -> Result<SocketAddr, ServerError> {
        let port = self
            .config
            .port
            .ok_or_else(|| ServerError::InvalidPort("missing".to_string()))?;
        self.start(port).await
    }

    /// Binds the listener and starts accepting connections.
    pub async fn start(&mut self, port: u16) -> Result<SocketAddr, ServerError> {
        if port == 0 {
            return Err(ServerError::InvalidPort(port.to_string()));
        }
        if let Some(listening) = &self.listening {
            return Err(ServerError::AlreadyRunning(listening.local_addr));
        }

        let listener = TcpListener::bind((self.config.host, port))
            .await
            .map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;
        log(
            LogLevel::Info,
            &format!("Server started on {}", local_addr),
        );

        let dispatcher = Dispatcher::new(Arc::clone(&self.router), self.config.body_limits());
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, dispatcher, shutdown_rx));

        self.listening = Some(Listening {
            local_addr,
            shutdown,
            task,
        });
        Ok(local_addr)
    }

    /// Closes the listener and clears every route. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        if let Some(listening) = self.listening.take() {
            let _ = listening.shutdown.send(());
            if let Err(e) = listening.task.await {
                log(LogLevel::Error, &format!("Accept loop failed: {}", e));
            }
            log(
                LogLevel::Info,
                &format!("Server on {} stopped", listening.local_addr),
            );
        }
        self.router.write().await.clear();
    }

    /// Gets the bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.as_ref().map(|listening| listening.local_addr)
    }

    /// Returns true while the listener is accepting connections.
    pub fn is_running(&self) -> bool {
        self.listening.is_some()
    }
}

async fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, dispatcher).await {
                                log(LogLevel::Warn, &format!("Error handling connection from {}: {}", addr, e));
                            }
                        });
                    }
                    Err(e) => {
                        log(LogLevel::Error, &format!("Error accepting connection: {}", e));
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

/// Handles a single connection: one request, one response, then close.
async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Dispatcher,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    let response = match read_head(&mut reader).await? {
        Head::Request(request) => {
            let request = request.with_remote_addr(addr);
            log(
                LogLevel::Info,
                &format!(
                    "{} - \"{} {} {}\"",
                    addr,
                    request.method(),
                    request.url(),
                    request.version()
                ),
            );
            dispatcher.dispatch(request, &mut reader).await
        }
        Head::Rejected(status_code, reason) => {
            log(LogLevel::Warn, &format!("{} - rejected: {}", addr, reason));
            Response::error(status_code, &reason)
        }
        Head::Closed => return Ok(()),
    };

    write_half.write_all(&response.to_http_response()).await?;
    write_half.flush().await?;
    write_half.shutdown().await?;

    let mut leftover = (&mut reader).take(LINGER_BYTES);
    let _ = timeout(LINGER_TIMEOUT, tokio::io::copy(&mut leftover, &mut tokio::io::sink())).await;
    Ok(())
}

/// Outcome of reading a request head.
enum Head {
    Request(Request),
    Rejected(u16, String),
    Closed,
}

/// One line of the request head.
enum Line {
    Text(String),
    Invalid,
    TooLarge,
    Eof,
}

/// Reads one line without consuming more than `budget` bytes.
async fn read_head_line<R>(reader: &mut R, budget: &mut usize) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(*budget as u64)
        .read_until(b'\n', &mut buf)
        .await?;
    *budget -= n;

    if !buf.ends_with(b"\n") && *budget == 0 {
        return Ok(Line::TooLarge);
    }
    if n == 0 {
        return Ok(Line::Eof);
    }
    Ok(match String::from_utf8(buf) {
        Ok(text) => Line::Text(text),
        Err(_) => Line::Invalid,
    })
}

/// Reads the request line and headers, leaving the body in the reader.
///
/// At most `MAX_HEAD_BYTES` are buffered; a longer head is rejected with 431.
async fn read_head<R>(reader: &mut R) -> std::io::Result<Head>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = MAX_HEAD_BYTES;
    let request_line = match read_head_line(reader, &mut budget).await? {
        Line::Text(text) => text,
        Line::Eof => return Ok(Head::Closed),
        Line::Invalid => return Ok(invalid_encoding()),
        Line::TooLarge => return Ok(too_large()),
    };

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    let [method, url, version] = parts.as_slice() else {
        return Ok(Head::Rejected(400, "Invalid request line".to_string()));
    };
    let Some(method) = Method::parse(method) else {
        return Ok(Head::Rejected(405, format!("Unsupported method: {}", method)));
    };
    let (url, version) = (url.to_string(), version.to_string());

    let mut headers: HashMap<String, String> = HashMap::new();
    loop {
        let line = match read_head_line(reader, &mut budget).await? {
            Line::Text(text) => text,
            Line::Eof => break,
            Line::Invalid => return Ok(invalid_encoding()),
            Line::TooLarge => return Ok(too_large()),
        };
        if line.trim().is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Ok(Head::Rejected(400, format!("Invalid header: {}", line.trim())));
        };
        let (name, value) = (name.trim().to_ascii_lowercase(), value.trim());

        match headers.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
            }
            Entry::Occupied(slot) if slot.key() == "content-length" => {
                if slot.get() != value {
                    return Ok(Head::Rejected(
                        400,
                        "Conflicting Content-Length headers".to_string(),
                    ));
                }
            }
            // Repeated fields are combined into one comma-separated value.
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.push_str(", ");
                existing.push_str(value);
            }
        }
    }

    Ok(Head::Request(
        Request::new(method, url, headers).with_version(version),
    ))
}

fn invalid_encoding() -> Head {
    Head::Rejected(400, "Request head is not valid UTF-8".to_string())
}

fn too_large() -> Head {
    Head::Rejected(431, "Request header fields too large".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn head(raw: &str) -> Head {
        let mut reader = BufReader::new(raw.as_bytes());
        read_head(&mut reader).await.unwrap()
    }

    #[tokio::test]
    async fn test_read_head() {
        let raw = "POST /user/add?x=1 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\r\n{}";
        let mut reader = BufReader::new(raw.as_bytes());
        let Head::Request(request) = read_head(&mut reader).await.unwrap() else {
            panic!("expected a request");
        };
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.url(), "/user/add?x=1");
        assert_eq!(request.version(), "HTTP/1.1");
        assert_eq!(request.header("content-type"), Some("application/json"));

        // The body stays in the reader.
        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "{}");
    }

    #[tokio::test]
    async fn test_rejected_heads() {
        assert!(matches!(head("garbage\r\n\r\n").await, Head::Rejected(400, _)));
        assert!(matches!(
            head("PATCH /x HTTP/1.1\r\n\r\n").await,
            Head::Rejected(405, _)
        ));
        assert!(matches!(
            head("GET /x HTTP/1.1\r\nno-colon\r\n\r\n").await,
            Head::Rejected(400, _)
        ));
        assert!(matches!(head("").await, Head::Closed));

        let huge = format!("GET /x HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(MAX_HEAD_BYTES));
        assert!(matches!(head(&huge).await, Head::Rejected(431, _)));
    }

    #[tokio::test]
    async fn test_request_line_without_newline_is_bounded() {
        let endless = format!("GET /{}", "a".repeat(4 * MAX_HEAD_BYTES));
        let mut reader = BufReader::new(endless.as_bytes());
        assert!(matches!(
            read_head(&mut reader).await.unwrap(),
            Head::Rejected(431, _)
        ));

        // Nothing past the limit was consumed.
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest.len(), endless.len() - MAX_HEAD_BYTES);
    }

    #[tokio::test]
    async fn test_non_utf8_head_is_400() {
        let raw: &[u8] = b"GET /caf\xe9 HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let mut reader = BufReader::new(raw);
        let Head::Rejected(status, reason) = read_head(&mut reader).await.unwrap() else {
            panic!("expected a rejection");
        };
        assert_eq!(status, 400);
        assert_eq!(reason, "Request head is not valid UTF-8");

        let raw: &[u8] = b"GET / HTTP/1.1\r\nX-Name: Jos\xe9\r\n\r\n";
        let mut reader = BufReader::new(raw);
        assert!(matches!(
            read_head(&mut reader).await.unwrap(),
            Head::Rejected(400, _)
        ));
    }

    #[tokio::test]
    async fn test_repeated_headers() {
        let Head::Request(request) =
            head("GET / HTTP/1.1\r\nAccept: a\r\naccept: b\r\nContent-Length: 0\r\nContent-Length: 0\r\n\r\n").await
        else {
            panic!("expected a request");
        };
        assert_eq!(request.header("accept"), Some("a, b"));
        assert_eq!(request.header("content-length"), Some("0"));

        assert!(matches!(
            head("POST / HTTP/1.1\r\nContent-Length: 3\r\ncontent-length: 30\r\n\r\n").await,
            Head::Rejected(400, _)
        ));
    }

    #[tokio::test]
    async fn test_start_rejects_port_zero() {
        let mut server = Server::new(Router::new());
        assert!(matches!(
            server.start(0).await,
            Err(ServerError::InvalidPort(_))
        ));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_start_from_config_requires_port() {
        let mut server = Server::new(Router::new());
        assert!(matches!(
            server.start_from_config().await,
            Err(ServerError::InvalidPort(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_without_start_clears_routes() {
        let mut router = Router::new();
        router.get("/a", |_: &Request| Some(Reply::new())).unwrap();
        let mut server = Server::new(router);

        server.stop().await;
        server.stop().await;
        assert!(server.router().read().await.is_empty());
    }
}
