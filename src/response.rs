/* src/response.rs */

use serde_json::Value;

/// Body carried by a [`Reply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Written as-is.
    Text(String),
    /// Written as-is.
    Bytes(Vec<u8>),
    /// Serialized with `Content-Type: application/json`.
    Json(Value),
}

impl Payload {
    /// Returns true if the payload produces no body on the wire.
    ///
    /// Empty text and bytes are absent, as are the JSON values `null`, `false`,
    /// `0` and `""`.
    pub fn is_absent(&self) -> bool {
        match self {
            Payload::Text(text) => text.is_empty(),
            Payload::Bytes(bytes) => bytes.is_empty(),
            Payload::Json(value) => match value {
                Value::Null => true,
                Value::Bool(flag) => !flag,
                Value::Number(number) => number.as_f64() == Some(0.0),
                Value::String(text) => text.is_empty(),
                Value::Array(_) | Value::Object(_) => false,
            },
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(text) => text.into_bytes(),
            Payload::Bytes(bytes) => bytes,
            Payload::Json(value) => value.to_string().into_bytes(),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// What a handler returns: a status, headers and an optional body.
///
/// Every field is optional. An empty `Reply` is shaped as `200 OK` with no body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    code: Option<u16>,
    message: Option<String>,
    headers: Vec<(String, String)>,
    data: Option<Payload>,
    download_as: Option<String>,
    redirect_to: Option<String>,
}

impl Reply {
    /// Creates an empty reply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reply with the given status code.
    pub fn status(code: u16) -> Self {
        Self::new().with_code(code)
    }

    /// Creates a 200 reply with a JSON body.
    pub fn json(value: Value) -> Self {
        Self::new().with_data(value)
    }

    /// Creates a 200 reply with a text body.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with_data(text.into())
    }

    /// Creates a reply served by the route matching `path`, in the same request.
    pub fn redirect(path: impl Into<String>) -> Self {
        Self {
            redirect_to: Some(path.into()),
            ..Self::default()
        }
    }

    /// Sets the status code.
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Overrides the reason phrase.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Adds a header to the reply.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Sets the body.
    pub fn with_data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Serves the body as an attachment with the given file name.
    pub fn download_as(mut self, filename: impl Into<String>) -> Self {
        self.download_as = Some(filename.into());
        self
    }

    /// Gets the status code, if set.
    pub fn code(&self) -> Option<u16> {
        self.code
    }

    /// Gets the explicit headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Gets the body, if set.
    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }

    /// Gets the redirect target, if set.
    pub fn redirect_to(&self) -> Option<&str> {
        self.redirect_to.as_deref()
    }
}

/// A shaped HTTP response, ready to be written to the connection.
#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    message: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl Response {
    /// Shapes a handler reply into a response. `None` means no route matched.
    pub fn shape(reply: Option<Reply>) -> Self {
        let reply = reply.unwrap_or_else(|| Reply::status(404));
        let status_code = reply.code.unwrap_or(200);
        let message = reply
            .message
            .unwrap_or_else(|| status_text(status_code).to_string());

        let mut response = Self {
            status_code,
            message: strip_line_breaks(&message),
            headers: Vec::new(),
            body: None,
        };

        let data = reply.data.filter(|data| !data.is_absent());
        if matches!(data, Some(Payload::Json(_))) {
            response.set_header("Content-Type", "application/json");
        }
        for (name, value) in &reply.headers {
            response.set_header(name, value);
        }
        if let Some(filename) = &reply.download_as {
            response.set_header("Content-Type", "application/octet-stream");
            response.set_header(
                "Content-Disposition",
                &format!("attachment; filename=\"{filename}\""),
            );
        }

        if let Some(data) = data {
            let body = data.into_bytes();
            response.set_header("Content-Length", &body.len().to_string());
            response.body = Some(body);
        }
        response
    }

    /// Creates a response for a failure that never reached a handler.
    pub fn error(status_code: u16, message: &str) -> Self {
        Self::shape(Some(Reply::status(status_code).with_data(message)))
            .with_header("Content-Type", "text/plain; charset=utf-8")
    }

    /// Adds or replaces a header on the response.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Drops the body but keeps every header, `Content-Length` included.
    pub fn without_body(mut self) -> Self {
        self.body = None;
        self
    }

    /// CR and LF are removed from names and values so a header cannot split.
    fn set_header(&mut self, name: &str, value: &str) {
        let (name, value) = (strip_line_breaks(name), strip_line_breaks(value));
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Gets the status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Gets the reason phrase.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the response headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Gets a header value by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Gets the response body, if one is written.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Converts the Response into raw HTTP/1.1 bytes.
    pub fn to_http_response(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.message);
        for (key, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", key, value));
        }
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = head.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }
}

fn strip_line_breaks(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

/// Returns the standard reason phrase for a status code.
pub fn status_text(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        418 => "I'm a Teapot",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        508 => "Loop Detected",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_reply_is_not_found() {
        let response = Response::shape(None);
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.message(), "Not Found");
        assert!(response.body().is_none());
    }

    #[test]
    fn test_empty_reply_defaults_to_ok() {
        let response = Response::shape(Some(Reply::new()));
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.message(), "OK");
        assert!(response.body().is_none());
        assert!(response.header("Content-Type").is_none());
    }

    #[test]
    fn test_message_override() {
        let response = Response::shape(Some(Reply::status(202).with_message("Queued")));
        assert_eq!(response.message(), "Queued");
        assert!(
            response
                .to_http_response()
                .starts_with(b"HTTP/1.1 202 Queued\r\n")
        );
    }

    #[test]
    fn test_json_data_sets_content_type() {
        let response = Response::shape(Some(Reply::json(json!({"UserName": "rpatil26"}))));
        assert_eq!(response.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_slice(response.body().unwrap()).unwrap();
        assert_eq!(body["UserName"], "rpatil26");
    }

    #[test]
    fn test_text_data_has_no_inferred_content_type() {
        let response = Response::shape(Some(Reply::text("hello")));
        assert!(response.header("Content-Type").is_none());
        assert_eq!(response.body(), Some(&b"hello"[..]));
        assert_eq!(response.header("Content-Length"), Some("5"));
    }

    #[test]
    fn test_explicit_headers_win_over_inference() {
        let reply = Reply::json(json!([1, 2]))
            .with_header("Content-Type", "application/vnd.api+json")
            .with_header("X-Served-By", "Route-R");
        let response = Response::shape(Some(reply));
        assert_eq!(
            response.header("Content-Type"),
            Some("application/vnd.api+json")
        );
        assert_eq!(response.header("X-Served-By"), Some("Route-R"));
    }

    #[test]
    fn test_download_shaping() {
        let reply = Reply::text("a,b,c")
            .with_header("Content-Type", "text/csv")
            .download_as("f.txt");
        let response = Response::shape(Some(reply));
        assert_eq!(
            response.header("Content-Type"),
            Some("application/octet-stream")
        );
        assert_eq!(
            response.header("Content-Disposition"),
            Some("attachment; filename=\"f.txt\"")
        );
        assert_eq!(response.body(), Some(&b"a,b,c"[..]));
    }

    #[test]
    fn test_download_of_json_is_serialized_text() {
        let response = Response::shape(Some(Reply::json(json!({"a": 1})).download_as("a.json")));
        assert_eq!(
            response.header("Content-Type"),
            Some("application/octet-stream")
        );
        assert_eq!(response.body(), Some(&br#"{"a":1}"#[..]));
    }

    #[test]
    fn test_absent_data_writes_no_body() {
        let response = Response::shape(Some(Reply::text("")));
        assert!(response.body().is_none());
        assert!(response.header("Content-Length").is_none());

        let response = Response::shape(Some(Reply::json(Value::Null)));
        assert!(response.body().is_none());
        assert!(response.header("Content-Type").is_none());
    }

    #[test]
    fn test_falsy_json_writes_no_body() {
        for value in [json!(false), json!(0), json!(0.0), json!("")] {
            let response = Response::shape(Some(Reply::json(value.clone())));
            assert_eq!(response.status_code(), 200, "{value}");
            assert!(response.body().is_none(), "{value}");
            assert!(response.header("Content-Type").is_none(), "{value}");
            assert!(response.header("Content-Length").is_none(), "{value}");
        }
    }

    #[test]
    fn test_truthy_json_scalars_are_written() {
        for (value, wire) in [(json!(true), "true"), (json!(7), "7"), (json!("x"), "\"x\"")] {
            let response = Response::shape(Some(Reply::json(value)));
            assert_eq!(response.header("Content-Type"), Some("application/json"));
            assert_eq!(response.body(), Some(wire.as_bytes()));
        }
        let response = Response::shape(Some(Reply::json(json!([]))));
        assert_eq!(response.body(), Some(&b"[]"[..]));
    }

    #[test]
    fn test_line_breaks_cannot_inject_headers() {
        let reply = Reply::text("x")
            .with_message("OK\r\nX-Evil: 1")
            .with_header("X-Note\r\nX-Evil", "a\r\nSet-Cookie: s=1")
            .download_as("f.txt\r\nSet-Cookie: s=2");
        let raw = String::from_utf8(Response::shape(Some(reply)).to_http_response()).unwrap();

        assert!(!raw.contains("\r\nX-Evil"));
        assert!(!raw.contains("\r\nSet-Cookie"));
        assert!(raw.starts_with("HTTP/1.1 200 OKX-Evil: 1\r\n"));
        assert!(raw.contains("\r\nX-NoteX-Evil: aSet-Cookie: s=1\r\n"));
        assert!(raw.contains("filename=\"f.txtSet-Cookie: s=2\""));
    }

    #[test]
    fn test_without_body_keeps_headers() {
        let response = Response::shape(Some(Reply::text("hello"))).without_body();
        assert!(response.body().is_none());
        assert_eq!(response.header("Content-Length"), Some("5"));
        assert!(response.to_http_response().ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn test_wire_format() {
        let response = Response::shape(Some(Reply::text("hi").with_header("X-A", "1")));
        let raw = String::from_utf8(response.to_http_response()).unwrap();
        assert_eq!(
            raw,
            "HTTP/1.1 200 OK\r\nX-A: 1\r\nContent-Length: 2\r\nConnection: close\r\n\r\nhi"
        );
    }

    #[test]
    fn test_error_response() {
        let response = Response::error(400, "Malformed JSON body");
        assert_eq!(response.status_code(), 400);
        assert_eq!(
            response.header("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(response.body(), Some(&b"Malformed JSON body"[..]));
    }

    #[test]
    fn test_unknown_status_text() {
        assert_eq!(status_text(299), "Unknown");
        assert_eq!(status_text(501), "Not Implemented");
    }
}
