pub mod codec;
pub mod commands;
pub mod connection;
pub mod dispatch;
pub mod frame;
pub mod handler;
pub mod server;
pub mod session;
pub mod store;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

/// Default port number, same as Redis.
pub const DEFAULT_PORT: u16 = 6379;
