/// Content type used unless a caller overrides it.
pub const TEXT_PLAIN: &str = "text/plain";

/// Content type of the status endpoints.
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP status codes used by the server.
///
/// Common HTTP status codes used in responses:
/// - `Ok` (200): Request successful
/// - `Created` (201): Key stored
/// - `NoContent` (204): Key deleted
/// - `Found` (302): Redirect
/// - `BadRequest` (400): Malformed or oversized request
/// - `NotFound` (404): Unknown key or path
/// - `MethodNotAllowed` (405): HTTP method not supported
/// - `InternalServerError` (500): Server error
///
/// Any other code is carried as `Other` and reports the phrase "Unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 302 Found
    Found,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
    /// Any code outside the table
    Other(u16),
}

impl StatusCode {
    /// Maps a numeric code onto the table.
    ///
    /// # Example
    ///
    /// ```
    /// # use kvhttpd::http::response::StatusCode;
    /// assert_eq!(StatusCode::from_u16(404), StatusCode::NotFound);
    /// assert_eq!(StatusCode::from_u16(418).reason_phrase(), "Unknown");
    /// ```
    pub fn from_u16(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            302 => StatusCode::Found,
            400 => StatusCode::BadRequest,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            500 => StatusCode::InternalServerError,
            other => StatusCode::Other(other),
        }
    }

    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use kvhttpd::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::Found => 302,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
            StatusCode::Other(code) => *code,
        }
    }

    /// Returns the reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::Found => "Found",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::Other(_) => "Unknown",
        }
    }
}

/// A complete HTTP response ready to be serialized.
///
/// `Content-Length` and `Connection: close` are not stored here; the
/// writer always derives them from the body when serializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Value of the `Content-Type` header
    pub content_type: String,
    /// Extra headers in emission order (e.g. `Location`)
    pub headers: Vec<(String, String)>,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use kvhttpd::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .content_type("application/json")
///     .body(b"{}".to_vec())
///     .build();
/// assert_eq!(response.content_type, "application/json");
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    content_type: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: TEXT_PLAIN.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Overrides the default `text/plain` content type.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Appends an extra header.
    ///
    /// `Content-Type`, `Content-Length` and `Connection` are owned by the
    /// writer; passing them here is ignored.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let reserved = ["Content-Type", "Content-Length", "Connection"]
            .iter()
            .any(|r| r.eq_ignore_ascii_case(&key));
        if !reserved {
            self.headers.push((key, value.into()));
        }
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final Response.
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            content_type: self.content_type,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    /// Plain-text response with the given status and body.
    pub fn text(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(status).body(body).build()
    }

    /// Creates a 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::text(StatusCode::Ok, body)
    }

    pub fn created() -> Self {
        Self::text(StatusCode::Created, "Created")
    }

    /// 204 with an empty body.
    pub fn no_content() -> Self {
        Self::text(StatusCode::NoContent, Vec::<u8>::new())
    }

    pub fn redirect(location: &str) -> Self {
        ResponseBuilder::new(StatusCode::Found)
            .header("Location", location)
            .body(format!("Redirecting to {location}"))
            .build()
    }

    pub fn bad_request(message: &str) -> Self {
        Self::text(StatusCode::BadRequest, message)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found(message: &str) -> Self {
        Self::text(StatusCode::NotFound, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::text(StatusCode::MethodNotAllowed, "Method Not Allowed")
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::text(StatusCode::InternalServerError, "Internal Server Error")
    }

    /// Looks up an extra header by name (case-insensitive).
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}
