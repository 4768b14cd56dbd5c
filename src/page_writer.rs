//! Serves resolved static pages and error pages onto a response sink.

use crate::error::Result;
use crate::error_page::{ErrorPage, ErrorPageRenderer};
use crate::pages::{self, PageName, PageRegistry};
use log::error;
use std::io::Write;
use std::path::Path;

const INTERNAL_SERVER_ERROR: &[u8] = b"Internal Server Error";

/// An HTTP response under construction.
///
/// Implementations must not commit the status to the client before the body
/// is complete: after a failed write the writer discards what was buffered and
/// starts a fresh response on the same sink.
pub trait ResponseSink: Write {
    fn set_status(&mut self, status_code: u16);
    fn set_header(&mut self, name: &str, value: &str);
    /// Drops any body bytes accepted so far.
    fn discard(&mut self);
}

/// Writes static pages with a guaranteed well-formed response.
///
/// Immutable after construction and safe to share between request handlers.
#[derive(Debug)]
pub struct PageWriter {
    pages: PageRegistry,
    error_renderer: ErrorPageRenderer,
}

impl PageWriter {
    pub fn new(override_dir: Option<&Path>, error_renderer: ErrorPageRenderer) -> Result<Self> {
        let pages = pages::load(override_dir)?;
        Ok(PageWriter {
            pages,
            error_renderer,
        })
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.pages
    }

    pub fn write_robots_txt<S: ResponseSink + ?Sized>(&self, sink: &mut S) {
        self.write_page(PageName::RobotsTxt, sink);
    }

    /// Writes `name` with status 200. If the sink rejects the body, the
    /// response is replaced by a plain-text 500.
    pub fn write_page<S: ResponseSink + ?Sized>(&self, name: PageName, sink: &mut S) {
        sink.set_status(200);
        if let Err(e) = sink.write_all(self.pages.get(name)) {
            error!("Error writing {:?}: {}", name.file_name(), e);
            write_internal_server_error(sink);
        }
    }

    /// Renders an error page for `status_code` through the configured template.
    pub fn write_error_page<S: ResponseSink + ?Sized>(&self, sink: &mut S, status_code: u16, message: &str) {
        let body = self
            .error_renderer
            .render_page(&ErrorPage::for_status(status_code, message));

        sink.discard();
        sink.set_status(status_code);
        sink.set_header("Content-Type", "text/html; charset=utf-8");
        if let Err(e) = sink.write_all(&body) {
            error!("Error writing {} error page: {}", status_code, e);
            write_internal_server_error(sink);
        }
    }
}

// Fixed plain-text body, never rendered through the error template.
fn write_internal_server_error<S: ResponseSink + ?Sized>(sink: &mut S) {
    sink.discard();
    sink.set_status(500);
    sink.set_header("Content-Type", "text/plain; charset=utf-8");
    if let Err(e) = sink.write_all(INTERNAL_SERVER_ERROR) {
        error!("Error writing internal server error response: {}", e);
    }
}
