//! WebSocket server for live reload.
//!
//! An acceptor thread performs the handshake and registers clients. A
//! reader thread drops clients that closed their side. Reload messages are
//! pushed to every registered client after each completed render pass.

use std::net::{IpAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::ReloadCoordinator;
use super::message::HotReloadMessage;
use crate::{debug, log};

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Running WebSocket server.
pub struct WsServer {
    port: u16,
    clients: Clients,
}

impl WsServer {
    /// Bind `interface:base_port` (or the next free port) and start accepting.
    pub fn start(interface: IpAddr, base_port: u16) -> Result<Arc<Self>> {
        let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
        listener.set_nonblocking(true)?;

        let server = Arc::new(Self {
            port,
            clients: Arc::new(Mutex::new(Vec::new())),
        });

        let clients = Arc::clone(&server.clients);
        std::thread::spawn(move || accept_loop(listener, clients));

        let clients = Arc::clone(&server.clients);
        std::thread::spawn(move || reader_loop(clients));

        debug!("reload"; "websocket server listening on port {}", port);
        Ok(server)
    }

    /// Port actually bound, which may differ from the requested one.
    pub fn port(&self) -> u16 {
        self.port
    }

    #[cfg(test)]
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Send a message to all connected clients, dropping dead ones.
    pub fn broadcast(&self, msg: &HotReloadMessage) {
        let mut clients = self.clients.lock();
        let count = clients.len();

        if count == 0 {
            debug!("reload"; "no clients connected");
            return;
        }

        let msg = Message::Text(msg.to_json().into());
        clients.retain_mut(|ws| match ws.send(msg.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!("reload"; "client disconnected: {}", e);
                false
            }
        });
        debug!("reload"; "broadcast to {} clients", count);
    }

    /// Push a reload message after every render pass until the runtime stops.
    pub async fn forward_passes(self: Arc<Self>, passes: Arc<ReloadCoordinator>) {
        let mut signal = passes.subscribe();
        loop {
            signal.wait().await;
            signal = passes.subscribe();

            let server = Arc::clone(&self);
            let sent = tokio::task::spawn_blocking(move || {
                server.broadcast(&HotReloadMessage::reload_with_reason("documents rendered"));
            })
            .await;
            if let Err(e) = sent {
                log!("reload"; "failed to notify clients: {}", e);
            }
        }
    }
}

fn accept_loop(listener: TcpListener, clients: Clients) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("reload"; "client connected: {}", addr);
                // Blocking for the handshake, non-blocking afterwards for polling reads
                let _ = stream.set_nonblocking(false);
                if let Some(ws) = handshake(stream) {
                    let mut clients = clients.lock();
                    clients.push(ws);
                    debug!("reload"; "clients: {}", clients.len());
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log!("reload"; "accept error: {}", e);
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn handshake(stream: TcpStream) -> Option<WebSocket<TcpStream>> {
    match tungstenite::accept(stream) {
        Ok(mut ws) => {
            let _ = ws.get_ref().set_nonblocking(true);
            let connected = HotReloadMessage::connected();
            if let Err(e) = ws.send(Message::Text(connected.to_json().into())) {
                log!("reload"; "failed to send connected message: {}", e);
                return None;
            }
            Some(ws)
        }
        Err(e) => {
            log!("reload"; "handshake failed: {}", e);
            None
        }
    }
}

/// Poll clients for close frames. Browsers never send anything else.
fn reader_loop(clients: Clients) {
    loop {
        std::thread::sleep(POLL_INTERVAL);

        clients.lock().retain_mut(|ws| match ws.read() {
            Ok(Message::Close(_)) => false,
            Ok(_) => true,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                true
            }
            Err(_) => false,
        });
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
