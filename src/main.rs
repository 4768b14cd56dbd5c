mod config;
mod error;
mod error_page;
mod http;
mod page_writer;
mod pages;
mod router;
mod server;

use config::Config;
use error::Result;
use error_page::ErrorPageRenderer;
use log::{error, info};
use page_writer::PageWriter;
use std::env;
use std::process;

fn main() {
    env_logger::init();

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());

    if let Err(e) = run(&config_path) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(config_path: &str) -> Result<()> {
    let config = Config::from_file(config_path)?;
    info!("Starting server with config from {}", config_path);

    let override_dir = config.override_dir();
    let error_renderer = ErrorPageRenderer::new(override_dir, config.footer.clone())?;
    let page_writer = PageWriter::new(override_dir, error_renderer)?;
    info!("Loaded {} static pages", page_writer.registry().len());

    let mut server = server::Server::new(&config, router::Router::new(page_writer))?;
    server.run()?;
    Ok(())
}
