use crate::http::{Method, Request, Response};
use crate::page_writer::{PageWriter, ResponseSink};
use crate::pages::PageName;
use log::debug;

pub struct Router {
    page_writer: PageWriter,
}

impl Router {
    pub fn new(page_writer: PageWriter) -> Self {
        Router { page_writer }
    }

    pub fn handle(&self, request: &Request) -> Response {
        let path = request.route_path();
        let page = PageName::ALL
            .into_iter()
            .find(|name| path.strip_prefix('/') == Some(name.file_name()));

        let Some(page) = page else {
            return self.error_response(404, "The requested page could not be found.");
        };

        if !matches!(request.method, Method::GET) {
            debug!("Rejecting {} {}", request.method.as_str(), path);
            return self.error_response(405, "Only GET is supported for this page.");
        }

        let mut res = Response::new(200);
        res.set_header("Content-Type", "text/plain; charset=utf-8");
        self.page_writer.write_page(page, &mut res);
        res
    }

    pub fn error_response(&self, status_code: u16, message: &str) -> Response {
        let mut res = Response::new(status_code);
        self.page_writer.write_error_page(&mut res, status_code, message);
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_page::ErrorPageRenderer;
    use crate::http::Parser;

    fn router() -> Router {
        let renderer = ErrorPageRenderer::from_source("{{ status_code }} {{ title }}", None).unwrap();
        Router::new(PageWriter::new(None, renderer).unwrap())
    }

    fn request(raw: &str) -> Request {
        let mut parser = Parser::new();
        parser.parse(raw.as_bytes());
        parser.request
    }

    #[test]
    fn test_robots_txt() {
        let res = router().handle(&request("GET /robots.txt?v=2 HTTP/1.1\r\n\r\n"));
        assert_eq!(res.status_code, 200);
        assert_eq!(res.body, PageName::RobotsTxt.default_content());
        assert_eq!(
            res.headers.get("Content-Type").map(String::as_str),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_unknown_path() {
        let res = router().handle(&request("GET /index.html HTTP/1.1\r\n\r\n"));
        assert_eq!(res.status_code, 404);
        assert_eq!(res.body, b"404 Not Found");
    }

    #[test]
    fn test_method_not_allowed() {
        let res = router().handle(&request("DELETE /robots.txt HTTP/1.1\r\n\r\n"));
        assert_eq!(res.status_code, 405);
        assert_eq!(res.body, b"405 Method Not Allowed");
    }

    #[test]
    fn test_bad_request() {
        let res = router().error_response(400, "Malformed request.");
        assert_eq!(res.status_code, 400);
        assert_eq!(res.body, b"400 Bad Request");
    }
}
