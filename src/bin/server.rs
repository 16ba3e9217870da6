use std::sync::Arc;

use clap::Parser;
use resp_server::server::{Config, Server};
use resp_server::store::Store;
use resp_server::{Error, DEFAULT_PORT};

#[derive(Parser, Debug)]
struct Args {
    /// The address to bind to; empty means all interfaces
    #[arg(short, long, default_value = "")]
    addr: String,

    /// The port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let mut server = Server::new(Config {
        addr: args.addr,
        port: args.port,
        ..Config::default()
    });
    server.set_command_handler(Arc::new(Store::new()));
    server.start().await?;

    tokio::signal::ctrl_c().await?;

    server.stop().await
}
