//! Well-known static pages and the loader that resolves them.
//!
//! Each page has compiled-in default content. An operator may replace it by
//! placing a file with the page's name in the override directory; the file is
//! read once when the registry is built.

use crate::error::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_ROBOTS_TXT: &[u8] = include_bytes!("../static/robots.txt");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageName {
    RobotsTxt,
}

impl PageName {
    pub const ALL: [PageName; 1] = [PageName::RobotsTxt];

    /// File name looked up in the override directory.
    pub fn file_name(self) -> &'static str {
        match self {
            PageName::RobotsTxt => "robots.txt",
        }
    }

    pub fn default_content(self) -> &'static [u8] {
        match self {
            PageName::RobotsTxt => DEFAULT_ROBOTS_TXT,
        }
    }
}

/// Outcome of probing the override directory for a single file.
#[derive(Debug)]
pub(crate) enum Override {
    Found(Vec<u8>),
    Missing,
}

/// Reads `<dir>/<file_name>`. Only `NotFound` maps to `Missing`; every other
/// I/O error is returned to the caller.
pub(crate) fn read_override(dir: Option<&Path>, file_name: &str) -> (PathBuf, io::Result<Override>) {
    let Some(dir) = dir.filter(|d| !d.as_os_str().is_empty()) else {
        return (PathBuf::from(file_name), Ok(Override::Missing));
    };

    let path = dir.join(file_name);
    let result = match fs::read(&path) {
        Ok(content) => Ok(Override::Found(content)),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(Override::Missing),
        Err(e) => Err(e),
    };
    (path, result)
}

/// Active content for every known page, fixed for the registry's lifetime.
#[derive(Debug)]
pub struct PageRegistry {
    pages: HashMap<PageName, Vec<u8>>,
}

impl PageRegistry {
    pub fn get(&self, name: PageName) -> &[u8] {
        // `load` inserts every `PageName::ALL` entry.
        self.pages
            .get(&name)
            .map_or_else(|| name.default_content(), Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }
}

/// Resolves every known page against `override_dir`. An unset or empty
/// directory yields the defaults without touching the filesystem.
pub fn load(override_dir: Option<&Path>) -> Result<PageRegistry> {
    let mut pages = HashMap::with_capacity(PageName::ALL.len());

    for name in PageName::ALL {
        let (path, result) = read_override(override_dir, name.file_name());
        let content = match result.map_err(|source| Error::ReadPage {
            path: path.clone(),
            source,
        })? {
            Override::Found(content) => {
                debug!("Loaded {} from {}", name.file_name(), path.display());
                content
            }
            Override::Missing => {
                debug!("Using built-in {}", name.file_name());
                name.default_content().to_vec()
            }
        };
        pages.insert(name, content);
    }

    Ok(PageRegistry { pages })
}
