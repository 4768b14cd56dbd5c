use crate::page_writer::ResponseSink;
use std::collections::HashMap;
use std::io;

#[derive(Debug)]
pub enum Method {
    GET,
    POST,
    DELETE,
    OTHER(String),
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "DELETE" => Method::DELETE,
            _ => Method::OTHER(s.to_string()),
        }
    }
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::DELETE => "DELETE",
            Method::OTHER(s) => s,
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new() -> Self {
        Request {
            method: Method::GET,
            path: String::new(),
            version: String::new(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Header lookup; names are stored lowercased.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Request target without its query string.
    pub fn route_path(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(path, _)| path)
    }
}

// Per-request limits; anything larger parses as an error.
const MAX_HEAD_BYTES: usize = 8 * 1024;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, PartialEq)]
pub enum ParseState {
    RequestLine,
    Headers,
    Body(usize),
    ChunkSize,
    ChunkData(usize),
    ChunkTrailer,
    Done,
    Error,
}

/// Incremental HTTP/1.1 request parser fed with whatever each socket read
/// returned.
pub struct Parser {
    pub state: ParseState,
    pub request: Request,
    buffer: Vec<u8>,
    head_len: usize,
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            state: ParseState::RequestLine,
            request: Request::new(),
            buffer: Vec::new(),
            head_len: 0,
        }
    }

    /// Starts the next request on the same connection. Bytes already read
    /// past the previous request are kept and parsed immediately.
    pub fn reset(&mut self) {
        self.state = ParseState::RequestLine;
        self.request = Request::new();
        self.head_len = 0;
        self.parse(&[]);
    }

    pub fn parse(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        while let Some(next) = self.step() {
            self.state = next;
        }
    }

    /// Advances one state, or returns `None` when more input is needed or
    /// parsing has finished.
    fn step(&mut self) -> Option<ParseState> {
        match self.state {
            ParseState::RequestLine | ParseState::Headers => {
                let Some(line) = self.take_line() else {
                    return self.head_overflow();
                };
                self.head_len += line.len() + 2;
                if self.head_len > MAX_HEAD_BYTES {
                    return Some(ParseState::Error);
                }
                if self.state == ParseState::RequestLine {
                    Some(self.request_line(&line))
                } else if line.is_empty() {
                    Some(self.body_state())
                } else {
                    self.header_line(&line);
                    Some(ParseState::Headers)
                }
            }
            ParseState::Body(len) => {
                if self.buffer.len() < len {
                    return None;
                }
                self.request.body = self.buffer.drain(..len).collect();
                Some(ParseState::Done)
            }
            ParseState::ChunkSize => {
                let line = self.take_line()?;
                match usize::from_str_radix(line.trim(), 16) {
                    Ok(0) => Some(ParseState::ChunkTrailer),
                    Ok(size) if size <= MAX_BODY_BYTES.saturating_sub(self.request.body.len()) => {
                        Some(ParseState::ChunkData(size))
                    }
                    _ => Some(ParseState::Error),
                }
            }
            ParseState::ChunkData(size) => {
                if self.buffer.len() < size + 2 {
                    return None;
                }
                if &self.buffer[size..size + 2] != b"\r\n" {
                    return Some(ParseState::Error);
                }
                self.request.body.extend_from_slice(&self.buffer[..size]);
                self.buffer.drain(..size + 2);
                Some(ParseState::ChunkSize)
            }
            ParseState::ChunkTrailer => {
                let line = self.take_line()?;
                if line.is_empty() {
                    Some(ParseState::Done)
                } else {
                    Some(ParseState::ChunkTrailer)
                }
            }
            ParseState::Done | ParseState::Error => None,
        }
    }

    /// Removes one CRLF-terminated line from the buffer.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.windows(2).position(|w| w == b"\r\n")?;
        let line = String::from_utf8_lossy(&self.buffer[..pos]).into_owned();
        self.buffer.drain(..pos + 2);
        Some(line)
    }

    fn head_overflow(&self) -> Option<ParseState> {
        if self.head_len + self.buffer.len() > MAX_HEAD_BYTES {
            Some(ParseState::Error)
        } else {
            None
        }
    }

    fn request_line(&mut self, line: &str) -> ParseState {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(path), Some(version), None) => {
                self.request.method = Method::from(method);
                self.request.path = path.to_string();
                self.request.version = version.to_string();
                ParseState::Headers
            }
            _ => ParseState::Error,
        }
    }

    fn header_line(&mut self, line: &str) {
        if let Some((key, value)) = line.split_once(':') {
            self.request
                .headers
                .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    fn body_state(&self) -> ParseState {
        if let Some(te) = self.request.header("transfer-encoding") {
            return if te.eq_ignore_ascii_case("chunked") {
                ParseState::ChunkSize
            } else {
                ParseState::Error
            };
        }
        match self.request.header("content-length").map(str::parse::<usize>) {
            None | Some(Ok(0)) => ParseState::Done,
            Some(Ok(len)) if len <= MAX_BODY_BYTES => ParseState::Body(len),
            Some(_) => ParseState::Error,
        }
    }
}

pub fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Fully buffered response. Nothing reaches the socket until `to_bytes`, so
/// the status and body may be replaced any number of times before then.
#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status_code: u16) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Server".to_string(), "StaticPageServer/0.1.0".to_string());
        Response {
            status_code,
            headers,
            body: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut resp = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status_code,
            reason_phrase(self.status_code)
        )
        .into_bytes();
        for (key, value) in &self.headers {
            resp.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
        }
        resp.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        resp.extend_from_slice(b"\r\n");
        resp.extend_from_slice(&self.body);
        resp
    }
}

impl io::Write for Response {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseSink for Response {
    fn set_status(&mut self, status_code: u16) {
        self.status_code = status_code;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    fn discard(&mut self) {
        self.body.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_simple_get() {
        let mut parser = Parser::new();
        parser.parse(b"GET /robots.txt?x=1 HTTP/1.1\r\nHost: localhost\r\n\r\n");

        assert_eq!(parser.state, ParseState::Done);
        assert_eq!(parser.request.method.as_str(), "GET");
        assert_eq!(parser.request.route_path(), "/robots.txt");
        assert_eq!(parser.request.header("Host"), Some("localhost"));
    }

    #[test]
    fn test_parse_split_across_reads() {
        let mut parser = Parser::new();
        parser.parse(b"POST /upload HTTP/1.1\r\ncontent-le");
        assert_eq!(parser.state, ParseState::Headers);

        parser.parse(b"ngth: 5\r\n\r\nhello");
        assert_eq!(parser.state, ParseState::Done);
        assert_eq!(parser.request.body, b"hello");
    }

    #[test]
    fn test_parse_chunked_body() {
        let mut parser = Parser::new();
        parser.parse(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");

        assert_eq!(parser.state, ParseState::Done);
        assert_eq!(parser.request.body, b"abcde");
    }

    #[test]
    fn test_parse_malformed_request_line() {
        let mut parser = Parser::new();
        parser.parse(b"GARBAGE\r\n\r\n");
        assert_eq!(parser.state, ParseState::Error);
    }

    #[test]
    fn test_parse_rejects_overflowing_chunk_size() {
        let mut parser = Parser::new();
        parser.parse(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n1\r\na\r\nffffffffffffffff\r\nxx");
        assert_eq!(parser.state, ParseState::Error);
    }

    #[test]
    fn test_parse_rejects_chunk_without_terminator() {
        let mut parser = Parser::new();
        parser.parse(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nabc\r\n0\r\n\r\n");
        assert_eq!(parser.state, ParseState::Error);
    }

    #[test]
    fn test_reset_keeps_pipelined_request() {
        let mut parser = Parser::new();
        parser.parse(b"GET /robots.txt HTTP/1.1\r\n\r\nGET /second HTTP/1.1\r\n\r\n");
        assert_eq!(parser.state, ParseState::Done);
        assert_eq!(parser.request.path, "/robots.txt");

        parser.reset();
        assert_eq!(parser.state, ParseState::Done);
        assert_eq!(parser.request.path, "/second");

        parser.reset();
        assert_eq!(parser.state, ParseState::RequestLine);
    }

    #[test]
    fn test_parse_rejects_oversized_head() {
        let mut parser = Parser::new();
        parser.parse(b"GET / HTTP/1.1\r\n");
        parser.parse(&vec![b'a'; MAX_HEAD_BYTES + 1]);
        assert_eq!(parser.state, ParseState::Error);
    }

    #[test]
    fn test_parse_rejects_oversized_body() {
        let mut parser = Parser::new();
        let raw = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY_BYTES + 1);
        parser.parse(raw.as_bytes());
        assert_eq!(parser.state, ParseState::Error);
    }

    #[test]
    fn test_response_serialization() {
        let mut res = Response::new(200);
        res.write_all(b"hi").unwrap();

        let raw = String::from_utf8(res.to_bytes()).unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Content-Length: 2\r\n"));
        assert!(raw.ends_with("\r\n\r\nhi"));
    }

    #[test]
    fn test_response_discard_and_rewrite() {
        let mut res = Response::new(200);
        res.write_all(b"partial").unwrap();

        res.discard();
        res.set_status(500);
        res.write_all(b"Internal Server Error").unwrap();

        assert_eq!(res.status_code, 500);
        assert_eq!(res.body, b"Internal Server Error");
    }
}
