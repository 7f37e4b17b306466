use kvhttpd::http::request::{Method, Request, RequestBuilder};

#[test]
fn test_method_table() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("DELETE", Method::DELETE),
        ("PUT", Method::UNKNOWN),
        ("PATCH", Method::UNKNOWN),
        ("", Method::UNKNOWN),
    ];

    for (token, expected) in methods {
        assert_eq!(Method::from_token(token), expected);
    }
}

#[test]
fn test_method_display() {
    assert_eq!(Method::DELETE.to_string(), "DELETE");
    assert_eq!(Method::UNKNOWN.as_str(), "UNKNOWN");
}

#[test]
fn test_request_body_helpers() {
    let req = Request {
        method: Method::POST,
        path: "/api/k".to_string(),
        version: "HTTP/1.1".to_string(),
        headers: String::new(),
        body: Some(b"abc".to_vec()),
    };

    assert!(req.has_body());
    assert_eq!(req.body_len(), 3);
    assert_eq!(req.body_bytes(), b"abc");
}

#[test]
fn test_request_without_body() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/api/k")
        .build()
        .unwrap();

    assert!(!req.has_body());
    assert_eq!(req.body_len(), 0);
    assert_eq!(req.body_bytes(), b"");
    assert_eq!(req.version, "HTTP/1.1");
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
    assert!(
        RequestBuilder::new()
            .method(Method::GET)
            .path("no-slash")
            .build()
            .is_err()
    );
}

#[test]
fn test_request_builder_fluent_api() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api/k")
        .version("HTTP/1.0")
        .headers("Host: x")
        .body("v")
        .build()
        .unwrap();

    assert_eq!(req.version, "HTTP/1.0");
    assert_eq!(req.headers, "Host: x");
    assert_eq!(req.body.as_deref(), Some(&b"v"[..]));
}
