use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::connection::Connection;
use crate::dispatch::{Action, Dispatcher, Executor, Tracer};
use crate::frame::Frame;
use crate::handler::UserCommandHandler;
use crate::session::Session;
use crate::{Error, DEFAULT_PORT};

#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address. Empty means all interfaces.
    pub addr: String,
    pub port: u16,
    /// Defaults for the SCAN family, available to user handlers.
    pub scan_count: u64,
    pub scan_pattern: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: String::new(),
            port: DEFAULT_PORT,
            scan_count: 10,
            scan_pattern: "*".to_string(),
        }
    }
}

/// The engine. Owns the listener and the executor registry; spawns one
/// session task per accepted connection. Registration and handler wiring
/// happen before `start`; each serving run dispatches against a frozen
/// snapshot of the registry.
pub struct Server {
    config: Config,
    dispatcher: Dispatcher,
    local_addr: Option<SocketAddr>,
    shutdown: Option<watch::Sender<bool>>,
    accept_task: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new(config: Config) -> Server {
        Server {
            config,
            dispatcher: Dispatcher::new(),
            local_addr: None,
            shutdown: None,
            accept_task: None,
        }
    }

    /// Sets the handler that serves the data verbs.
    pub fn set_command_handler(&mut self, handler: Arc<dyn UserCommandHandler>) {
        self.dispatcher.set_user_handler(handler);
    }

    /// Sets a hook invoked for every dispatched command.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.dispatcher.set_tracer(tracer);
    }

    /// Registers an additional verb. Takes effect at the next `start`.
    pub fn register_executor(&mut self, verb: &str, executor: Executor) {
        self.dispatcher.register(verb, executor);
    }

    /// The bound address, available while the server is started. Useful
    /// when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Opens the listener and spawns the accept task. Callable again only
    /// after `stop`.
    pub async fn start(&mut self) -> Result<(), Error> {
        let _ = tracing_subscriber::fmt()
            .try_init()
            .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

        if self.shutdown.is_some() {
            return Err("server is already started".into());
        }

        let host = if self.config.addr.is_empty() {
            "0.0.0.0"
        } else {
            self.config.addr.as_str()
        };
        let listener = TcpListener::bind((host, self.config.port)).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Arc::new(self.dispatcher.clone());
        self.accept_task = Some(tokio::spawn(serve(listener, dispatcher, shutdown_rx)));
        self.shutdown = Some(shutdown_tx);

        info!(
            "{}/{} (PID:{}) started on {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            process::id(),
            local_addr,
        );

        Ok(())
    }

    /// Signals shutdown and closes the listener. In-flight sessions exit
    /// cooperatively after their current request; they are not awaited.
    pub async fn stop(&mut self) -> Result<(), Error> {
        let Some(shutdown) = self.shutdown.take() else {
            return Ok(());
        };
        let _ = shutdown.send(true);

        if let Some(task) = self.accept_task.take() {
            task.await?;
        }
        self.local_addr = None;

        info!(
            "{}/{} (PID:{}) terminated",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            process::id(),
        );

        Ok(())
    }

    pub async fn restart(&mut self) -> Result<(), Error> {
        self.stop().await?;
        self.start().await
    }
}

async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((socket, client_address)) => {
                    debug!(%client_address, "accepted connection");
                    let dispatcher = dispatcher.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, client_address, dispatcher, shutdown).await {
                            error!("connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }
}

#[instrument(
    name = "connection",
    skip(stream, dispatcher, shutdown),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream);
    let mut session = Session::new(conn.id);

    tracing::Span::current()
        .record("connection_id", conn.id)
        .record("client_address", client_address.to_string());

    loop {
        // The shutdown signal is only consulted between frames, so a
        // session always finishes the request it is processing.
        let maybe_frame = tokio::select! {
            res = conn.read_frame() => res?,
            _ = shutdown.changed() => {
                debug!("shutdown signal received, closing session");
                return Ok(());
            }
        };

        let Some(frame) = maybe_frame else { break };
        debug!(%frame, "received frame");

        // Only array frames carry commands; anything else is dropped
        // without a response.
        let request = match frame {
            Frame::Array(items) => items,
            frame => {
                debug!(%frame, "ignoring non-array frame");
                continue;
            }
        };

        let (response, action) = dispatcher.execute(&mut session, request);

        // A failed write is not fatal by itself: a truly broken
        // connection surfaces on the next read.
        if let Err(err) = conn.write_frame(&response).await {
            error!(%err, "failed to write response");
        }

        if action == Action::Close {
            break;
        }
    }

    debug!("connection closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn test_server() -> Server {
        let mut server = Server::new(Config {
            port: 0,
            ..Config::default()
        });
        server.set_command_handler(Arc::new(Store::new()));
        server
    }

    #[tokio::test]
    async fn start_exposes_the_bound_address() {
        let mut server = test_server();

        assert_eq!(server.local_addr(), None);
        server.start().await.unwrap();
        assert!(server.local_addr().is_some());

        server.stop().await.unwrap();
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn start_twice_is_an_error() {
        let mut server = test_server();

        server.start().await.unwrap();
        assert!(server.start().await.is_err());

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let mut server = test_server();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn restart_rebinds_the_listener() {
        let mut server = test_server();

        server.start().await.unwrap();
        server.restart().await.unwrap();
        assert!(server.local_addr().is_some());

        server.stop().await.unwrap();
    }
}
