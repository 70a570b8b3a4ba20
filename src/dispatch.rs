/* src/dispatch.rs */

use crate::error::DispatchError;
use crate::request::{Body, Request};
use crate::response::{Reply, Response};
use crate::router::{Method, RouteMatch, Router};
use fancy_log::{LogLevel, log};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;
use tokio::time::timeout;

/// Bounds applied while accumulating a request body.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub max_bytes: usize,
    pub timeout: Duration,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_bytes: 1024 * 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Turns a request head plus a body stream into a shaped response.
///
/// The route table is only read-locked while resolving; the lock is released
/// before the body is read and before the handler runs.
#[derive(Clone)]
pub struct Dispatcher {
    router: Arc<RwLock<Router>>,
    limits: BodyLimits,
}

impl Dispatcher {
    /// Creates a dispatcher over a shared router.
    pub fn new(router: Arc<RwLock<Router>>, limits: BodyLimits) -> Self {
        Self { router, limits }
    }

    /// Dispatches one request. Never fails: every error becomes a response.
    ///
    /// HEAD requests are served like any other method, then the body is
    /// dropped so only the status line and headers go out.
    pub async fn dispatch<R>(&self, request: Request, body: &mut R) -> Response
    where
        R: AsyncRead + Unpin,
    {
        let head_only = request.method() == Method::Head;
        let response = self.serve(request, body).await;
        if head_only {
            response.without_body()
        } else {
            response
        }
    }

    async fn serve<R>(&self, mut request: Request, body: &mut R) -> Response
    where
        R: AsyncRead + Unpin,
    {
        let Some(matched) = self.resolve(&request, request.url()).await else {
            return Response::shape(None);
        };
        request.set_params(matched.params.clone());

        if request.method().has_body() {
            match read_body(body, &request, self.limits).await {
                Ok(decoded) => request.set_body(decoded),
                Err(e) => {
                    log(
                        LogLevel::Warn,
                        &format!("Rejected body for {}: {}", request.url(), e),
                    );
                    return Response::error(e.status_code(), &e.to_string());
                }
            }
        }

        let reply = match invoke(&matched, &request) {
            Ok(reply) => reply,
            Err(response) => return response,
        };

        let Some(target) = reply.redirect_to().map(str::to_string) else {
            return Response::shape(Some(reply));
        };
        self.redirect(request, &target).await
    }

    /// Serves `target` within the same request cycle. Only one hop is followed.
    async fn redirect(&self, mut request: Request, target: &str) -> Response {
        log(
            LogLevel::Debug,
            &format!("Redirecting {} -> {}", request.url(), target),
        );
        let Some(matched) = self.resolve(&request, target).await else {
            return Response::shape(None);
        };
        request.set_url(target);
        request.set_params(matched.params.clone());

        match invoke(&matched, &request) {
            Ok(reply) if reply.redirect_to().is_some() => {
                log(
                    LogLevel::Warn,
                    &format!("Redirect chain from {} stopped after one hop", target),
                );
                Response::shape(Some(Reply::status(508)))
            }
            Ok(reply) => Response::shape(Some(reply)),
            Err(response) => response,
        }
    }

    async fn resolve(&self, request: &Request, url: &str) -> Option<RouteMatch> {
        let matched = self.router.read().await.resolve(request.method(), url)?;
        log(LogLevel::Debug, &format!("Route: {}", matched.template));
        Some(matched)
    }
}

/// Calls the handler, normalizing "no answer" to 501 and a panic to 500.
fn invoke(matched: &RouteMatch, request: &Request) -> Result<Reply, Response> {
    match panic::catch_unwind(AssertUnwindSafe(|| matched.handler.handle(request))) {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => Ok(Reply::status(501)),
        Err(_) => {
            log(
                LogLevel::Warn,
                &format!("Handler for {} panicked", matched.template),
            );
            Err(Response::shape(Some(Reply::status(500))))
        }
    }
}

/// Accumulates the full body announced by `Content-Length` and decodes it.
pub async fn read_body<R>(
    reader: &mut R,
    request: &Request,
    limits: BodyLimits,
) -> Result<Body, DispatchError>
where
    R: AsyncRead + Unpin,
{
    let length = match request.header("content-length") {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map_err(|_| DispatchError::InvalidContentLength(value.to_string()))?,
        None if request.header("transfer-encoding").is_some() => {
            return Err(DispatchError::LengthRequired);
        }
        None => 0,
    };
    if length > limits.max_bytes {
        return Err(DispatchError::BodyTooLarge {
            limit: limits.max_bytes,
        });
    }

    let mut buf = vec![0; length];
    timeout(limits.timeout, reader.read_exact(&mut buf))
        .await
        .map_err(|_| DispatchError::BodyTimeout)??;
    log(LogLevel::Debug, &format!("Read {} body bytes", length));

    decode_body(buf, request.header("content-type"))
}

/// Decodes a complete body: JSON for exactly `application/json`, raw otherwise.
pub fn decode_body(buf: Vec<u8>, content_type: Option<&str>) -> Result<Body, DispatchError> {
    if buf.is_empty() {
        return Ok(Body::Empty);
    }
    if content_type == Some("application/json") {
        return Ok(Body::Json(serde_json::from_slice(&buf)?));
    }
    Ok(match String::from_utf8(buf) {
        Ok(text) => Body::Text(text),
        Err(e) => Body::Bytes(e.into_bytes()),
    })
}
