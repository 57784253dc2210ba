//! Preview server over the build output.
//!
//! Serves the output directory at `/` and every subfolder of `static/` at
//! `/<name>/`. HTML responses carry the live-reload client, which listens on
//! the WebSocket port for `{"type":"reload"}`.

mod path;
mod response;

pub use path::ServeRoots;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use tiny_http::{Request, Server};

use crate::config::ProjectConfig;
use crate::{core, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Worker threads answering requests.
const REQUEST_THREADS: usize = 4;

/// Bind the preview server and answer requests on a background thread.
///
/// The server is registered for Ctrl+C, which unblocks its request loop.
pub fn start(config: &ProjectConfig, ws_port: u16) -> Result<SocketAddr> {
    let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);
    core::register_server(Arc::clone(&server));

    let roots = Arc::new(ServeRoots {
        output: config.output_dir().to_path_buf(),
        static_dir: config.static_dir(),
    });
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("serve-{i}"))
        .build()
        .context("failed to create request thread pool")?;

    thread::Builder::new()
        .name("serve".into())
        .spawn(move || run_request_loop(&server, &pool, &roots, ws_port))
        .context("failed to spawn preview server thread")?;

    log!("serve"; "http://{}", addr);
    Ok(addr)
}

/// Bind to `interface`, trying successive ports when one is taken.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn run_request_loop(server: &Server, pool: &rayon::ThreadPool, roots: &Arc<ServeRoots>, ws_port: u16) {
    for request in server.incoming_requests() {
        let roots = Arc::clone(roots);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &roots, ws_port) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}

fn handle_request(request: Request, roots: &ServeRoots, ws_port: u16) -> Result<()> {
    if core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    match roots.resolve(request.url()) {
        Some(path) => response::respond_file(request, &path, ws_port),
        None => response::respond_not_found(request),
    }
}
