/* src/router.rs */

use crate::error::RouteError;
use crate::pattern::{self, RoutePattern};
use crate::query;
use crate::request::Request;
use crate::response::Reply;
use std::collections::HashMap;
use std::sync::Arc;

/// Represents an HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Trace,
    Connect,
}

impl Method {
    /// Tries to convert a string slice to a Method, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "PUT" => Some(Method::Put),
            "POST" => Some(Method::Post),
            "DELETE" => Some(Method::Delete),
            "OPTIONS" => Some(Method::Options),
            "HEAD" => Some(Method::Head),
            "TRACE" => Some(Method::Trace),
            "CONNECT" => Some(Method::Connect),
            _ => None,
        }
    }

    /// Returns true if requests with this method carry a body to accumulate.
    pub fn has_body(self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Put => write!(f, "PUT"),
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
            Method::Options => write!(f, "OPTIONS"),
            Method::Head => write!(f, "HEAD"),
            Method::Trace => write!(f, "TRACE"),
            Method::Connect => write!(f, "CONNECT"),
        }
    }
}

/// Something that answers a matched request.
///
/// Returning `None` means the route exists but produced no answer; the
/// dispatcher turns that into `501 Not Implemented`.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &Request) -> Option<Reply>;
}

impl<F> Handler for F
where
    F: Fn(&Request) -> Option<Reply> + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Option<Reply> {
        self(request)
    }
}

/// Shared handler reference stored in the route table.
pub type HandlerFn = Arc<dyn Handler>;

/// One registered route. Immutable once registered.
#[derive(Clone)]
pub struct RouteEntry {
    pattern: RoutePattern,
    handler: HandlerFn,
}

impl RouteEntry {
    /// Gets the compiled pattern.
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Gets the handler.
    pub fn handler(&self) -> &HandlerFn {
        &self.handler
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("template", &self.pattern.template())
            .finish_non_exhaustive()
    }
}

/// The result of resolving a URL against the route table.
#[derive(Clone)]
pub struct RouteMatch {
    /// Template of the route that matched.
    pub template: String,
    /// Handler of the route that matched.
    pub handler: HandlerFn,
    /// Query parameters with path variables merged on top.
    pub params: HashMap<String, String>,
}

/// The router, responsible for managing routes and their handlers.
///
/// Routes are kept per method in registration order, plus one `on` list used
/// for any method that has no routes of its own. The earliest registered
/// matching route always wins.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Vec<RouteEntry>>,
    fallback: Vec<RouteEntry>,
}

impl Router {
    /// Creates a new, empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route for a specific method.
    pub fn route<H: Handler>(
        &mut self,
        method: Method,
        template: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        let entry = Self::entry(template, handler)?;
        self.routes.entry(method).or_default().push(entry);
        Ok(self)
    }

    /// Adds a method-agnostic route, used when a method has no routes of its own.
    pub fn on<H: Handler>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError> {
        let entry = Self::entry(template, handler)?;
        self.fallback.push(entry);
        Ok(self)
    }

    pub fn get<H: Handler>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(Method::Get, template, handler)
    }

    pub fn put<H: Handler>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(Method::Put, template, handler)
    }

    pub fn post<H: Handler>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(Method::Post, template, handler)
    }

    pub fn delete<H: Handler>(
        &mut self,
        template: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        self.route(Method::Delete, template, handler)
    }

    pub fn options<H: Handler>(
        &mut self,
        template: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        self.route(Method::Options, template, handler)
    }

    pub fn head<H: Handler>(&mut self, template: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(Method::Head, template, handler)
    }

    pub fn trace<H: Handler>(
        &mut self,
        template: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        self.route(Method::Trace, template, handler)
    }

    pub fn connect<H: Handler>(
        &mut self,
        template: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        self.route(Method::Connect, template, handler)
    }

    fn entry<H: Handler>(template: &str, handler: H) -> Result<RouteEntry, RouteError> {
        Ok(RouteEntry {
            pattern: pattern::compile(template)?,
            handler: Arc::new(handler),
        })
    }

    /// Gets the candidate routes for a method: its own list if non-empty,
    /// otherwise the `on` list. Never a mix of both.
    pub fn lookup(&self, method: Method) -> &[RouteEntry] {
        match self.routes.get(&method) {
            Some(entries) if !entries.is_empty() => entries,
            _ => &self.fallback,
        }
    }

    /// Finds the first route matching the method and raw URL.
    pub fn resolve(&self, method: Method, raw_url: &str) -> Option<RouteMatch> {
        let (path, mut params) = query::decode(raw_url);
        self.lookup(method).iter().find_map(|entry| {
            let captured = entry.pattern.params(path)?;
            params.extend(captured);
            Some(RouteMatch {
                template: entry.pattern.template().to_string(),
                handler: Arc::clone(&entry.handler),
                params: std::mem::take(&mut params),
            })
        })
    }

    /// Gets the number of registered routes, `on` routes included.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum::<usize>() + self.fallback.len()
    }

    /// Returns true if no route is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every route, returning the router to its initial state.
    pub fn clear(&mut self) {
        self.routes.clear();
        self.fallback.clear();
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("fallback", &self.fallback)
            .finish()
    }
}
