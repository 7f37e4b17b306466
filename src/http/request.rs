/// HTTP request methods understood by the store.
///
/// Anything outside the fixed table parses as [`Method::UNKNOWN`]; that is
/// not a framing error, the router rejects it later with 405.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Read a key or a collaborator resource
    GET,
    /// POST - Store the body under a key
    POST,
    /// DELETE - Remove a key
    DELETE,
    /// Any other method token
    UNKNOWN,
}

/// A framed HTTP request.
///
/// Produced by the framer from a connection buffer and consumed by the
/// router. Headers are kept as the raw block between the request line and
/// the header/body boundary; they are never parsed into fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path, always starting with `/`
    pub path: String,
    /// HTTP version token (typically "HTTP/1.1")
    pub version: String,
    /// Raw header block, possibly empty.
    ///
    /// Decoded lossily: bytes that are not valid UTF-8 become U+FFFD, so
    /// this is not a byte-exact copy of what the peer sent.
    pub headers: String,
    /// Everything buffered after the boundary, `None` when nothing followed it
    pub body: Option<Vec<u8>>,
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: String,
    body: Option<Vec<u8>>,
}

impl Method {
    /// Maps a method token through the fixed table.
    ///
    /// Matching is case-sensitive.
    ///
    /// # Example
    ///
    /// ```
    /// # use kvhttpd::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Method::GET);
    /// assert_eq!(Method::from_token("get"), Method::UNKNOWN);
    /// ```
    pub fn from_token(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "DELETE" => Method::DELETE,
            _ => Method::UNKNOWN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::DELETE => "DELETE",
            Method::UNKNOWN => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            version: None,
            headers: String::new(),
            body: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<String>) -> Self {
        self.headers = headers.into();
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        let path = self.path.ok_or("path missing")?;
        if !path.starts_with('/') {
            return Err("path must start with '/'");
        }

        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
        })
    }
}

impl Request {
    /// Body bytes, empty when the request carried none.
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or(&[])
    }

    /// Length of the body; zero when absent.
    pub fn body_len(&self) -> usize {
        self.body_bytes().len()
    }

    pub fn has_body(&self) -> bool {
        self.body_len() > 0
    }
}
