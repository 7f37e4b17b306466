use crate::http::request::{Method, Request};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("request line is not terminated")]
    MissingLineTerminator,
    #[error("request line is not valid UTF-8")]
    InvalidEncoding,
    #[error("request line must have exactly three tokens")]
    InvalidRequestLine,
    #[error("request path must start with '/'")]
    InvalidPath,
}

/// Location of the header/body separator inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    /// Offset of the first separator byte
    pub start: usize,
    /// Offset of the first body byte
    pub body_start: usize,
}

/// Finds the first `\r\n\r\n` in `buf`, falling back to the first `\n\n`.
///
/// The event loop calls this after every read; a request is only handed to
/// [`parse_http_request`] once a boundary exists.
pub fn find_boundary(buf: &[u8]) -> Option<Boundary> {
    if let Some(start) = find(buf, b"\r\n\r\n") {
        return Some(Boundary {
            start,
            body_start: start + 4,
        });
    }

    find(buf, b"\n\n").map(|start| Boundary {
        start,
        body_start: start + 2,
    })
}

/// Whether `buf` holds a complete request head.
pub fn is_complete(buf: &[u8]) -> bool {
    find_boundary(buf).is_some()
}

/// Frames `buf` into a [`Request`].
///
/// The body is everything after the boundary up to the end of `buf`;
/// `Content-Length` is not consulted. Without a boundary the request is
/// framed as headers-only.
pub fn parse_http_request(buf: &[u8]) -> Result<Request, ParseError> {
    if buf.is_empty() {
        return Err(ParseError::Empty);
    }

    // Request line ends at the first LF, with an optional CR before it
    let newline = buf
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(ParseError::MissingLineTerminator)?;
    let line_end = if newline > 0 && buf[newline - 1] == b'\r' {
        newline - 1
    } else {
        newline
    };
    let headers_start = newline + 1;

    let request_line =
        std::str::from_utf8(&buf[..line_end]).map_err(|_| ParseError::InvalidEncoding)?;

    let mut parts = request_line.split_whitespace();
    let (Some(method_str), Some(path), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    if !path.starts_with('/') {
        return Err(ParseError::InvalidPath);
    }

    let (headers, body) = match find_boundary(buf) {
        Some(boundary) => {
            // "GET / HTTP/1.1\r\n\r\n" puts the boundary inside the request
            // line terminator, which leaves an empty header block
            let headers = if boundary.start > headers_start {
                &buf[headers_start..boundary.start]
            } else {
                &[][..]
            };
            let body = &buf[boundary.body_start.min(buf.len())..];
            (headers, (!body.is_empty()).then(|| body.to_vec()))
        }
        None => (&buf[headers_start..], None),
    };

    Ok(Request {
        method: Method::from_token(method_str),
        path: path.to_string(),
        version: version.to_string(),
        headers: String::from_utf8_lossy(headers).into_owned(),
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_boundary_wins_over_earlier_lf_pair() {
        let buf = b"GET / HTTP/1.1\nA: b\n\nx\r\n\r\ny";
        let boundary = find_boundary(buf).unwrap();

        assert_eq!(&buf[boundary.start..boundary.body_start], b"\r\n\r\n");
    }

    #[test]
    fn boundary_inside_request_line_terminator() {
        let req = parse_http_request(b"GET /api/x HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(req.headers, "");
        assert_eq!(req.body, None);
    }
}
