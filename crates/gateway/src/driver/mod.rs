//! Integration with the whatsapp-web.js driver process.

mod client;
mod process;
mod transport;

pub use client::DriverClient;
pub use process::DriverConfig;
