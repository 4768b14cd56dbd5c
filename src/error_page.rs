use crate::error::{Error, Result};
use crate::http::reason_phrase;
use crate::pages::{read_override, Override};
use log::{debug, error};
use minijinja::{context, Environment, HtmlEscape};
use std::path::Path;
use std::sync::Arc;

// The `.html` suffix turns on minijinja's HTML auto-escaping.
const TEMPLATE_NAME: &str = "error.html";
const DEFAULT_TEMPLATE: &str = include_str!("../static/error.html");

/// Values substituted into the error template.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorPage<'a> {
    pub status: Option<u16>,
    pub title: &'a str,
    pub message: Option<&'a str>,
}

impl<'a> ErrorPage<'a> {
    /// Titles the page with the status's reason phrase.
    pub fn for_status(status: u16, message: &'a str) -> Self {
        ErrorPage {
            status: Some(status),
            title: reason_phrase(status),
            message: Some(message),
        }
    }
}

/// Renders error bodies from a single compiled template.
///
/// The template is parsed at construction, so rendering never fails for any
/// input. Clones share the compiled template.
#[derive(Debug, Clone)]
pub struct ErrorPageRenderer {
    env: Arc<Environment<'static>>,
    footer: Option<String>,
}

impl ErrorPageRenderer {
    /// Uses `<override_dir>/error.html` when present, the built-in template
    /// otherwise.
    pub fn new(override_dir: Option<&Path>, footer: Option<String>) -> Result<Self> {
        let (path, result) = read_override(override_dir, TEMPLATE_NAME);
        match result.map_err(|source| Error::ReadTemplate {
            path: path.clone(),
            source,
        })? {
            Override::Found(bytes) => {
                debug!("Loaded error template from {}", path.display());
                let source = String::from_utf8(bytes).map_err(|e| Error::ReadTemplate {
                    path,
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                })?;
                Self::from_source(source, footer)
            }
            Override::Missing => Self::from_source(DEFAULT_TEMPLATE, footer),
        }
    }

    pub fn from_source(source: impl Into<String>, footer: Option<String>) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template_owned(TEMPLATE_NAME, source.into())?;
        Ok(ErrorPageRenderer {
            env: Arc::new(env),
            footer,
        })
    }

    pub fn render(&self, title: &str) -> Vec<u8> {
        self.render_page(&ErrorPage {
            title,
            ..ErrorPage::default()
        })
    }

    pub fn render_page(&self, page: &ErrorPage<'_>) -> Vec<u8> {
        let rendered = self.env.get_template(TEMPLATE_NAME).and_then(|tmpl| {
            tmpl.render(context! {
                title => page.title,
                message => page.message,
                status_code => page.status,
                footer => self.footer.as_deref(),
            })
        });

        match rendered {
            Ok(body) => body.into_bytes(),
            Err(e) => {
                error!("Error rendering error page {:?}: {}", page.title, e);
                HtmlEscape(page.title).to_string().into_bytes()
            }
        }
    }
}
