//! Canned server responses
//!
//! Byte-exact answers in the shapes the Ubidots endpoints produce, for
//! scripting a [`MockTransport`](crate::MockTransport).

const CHUNKED_HEADERS: &str = "HTTP/1.1 200 OK\r\n\
    Server: nginx\r\n\
    Date: Mon, 19 Oct 2026 10:00:00 GMT\r\n\
    Content-Type: application/json\r\n\
    Transfer-Encoding: chunked\r\n\
    Connection: close\r\n\
    Vary: Cookie\r\n\
    \r\n";

/// Header block of a chunked last-value answer, blank line included
pub fn http_chunked_headers() -> Vec<u8> {
    CHUNKED_HEADERS.as_bytes().to_vec()
}

/// Chunked body carrying a single value, followed by the last chunk
pub fn http_chunk(value: &str) -> Vec<u8> {
    format!("{:x}\r\n{value}\r\n0\r\n\r\n", value.len()).into_bytes()
}

/// Complete last-value answer
pub fn http_value(value: &str) -> Vec<u8> {
    let mut response = http_chunked_headers();
    response.extend(http_chunk(value));
    response
}

/// Last-value answer whose body is an HTML error page
pub fn http_html_error() -> Vec<u8> {
    let mut response = http_chunked_headers();
    response.extend_from_slice(b"<html><head><title>502 Bad Gateway</title></head></html>");
    response
}

/// Successful write answer
pub fn http_created() -> Vec<u8> {
    b"HTTP/1.1 200 OK\r\n\
      Server: nginx\r\n\
      Content-Type: application/json\r\n\
      Connection: close\r\n\
      \r\n\
      {\"temperature\":[{\"status_code\":201}]}"
        .to_vec()
}

/// Write rejected for a malformed payload
pub fn http_bad_request() -> Vec<u8> {
    b"HTTP/1.1 400 Bad Request\r\n\
      Server: nginx\r\n\
      Content-Type: application/json\r\n\
      Connection: close\r\n\
      \r\n\
      {\"code\": 400001, \"message\": \"Validation Error.\"}"
        .to_vec()
}

/// Write answered with a 200 status line but an error page body
pub fn http_ok_with_server_error_body() -> Vec<u8> {
    b"HTTP/1.1 200 OK\r\n\
      Content-Type: text/html\r\n\
      \r\n\
      <h1>Internal Server Error</h1>"
        .to_vec()
}

/// Write failing on the server side
pub fn http_internal_error() -> Vec<u8> {
    b"HTTP/1.1 500 Internal Server Error\r\n\
      Content-Type: text/html\r\n\
      \r\n\
      <h1>Server Error (500)</h1>"
        .to_vec()
}

/// Line-protocol write acknowledgement
pub fn line_ok() -> Vec<u8> {
    b"OK".to_vec()
}

/// Line-protocol last-value answer
pub fn line_value(value: &str) -> Vec<u8> {
    format!("OK|{value}").into_bytes()
}

/// Line-protocol rejection
pub fn line_error() -> Vec<u8> {
    b"ERROR invalid token".to_vec()
}
