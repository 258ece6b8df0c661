//! scrape-bridge: runs an external extraction worker per HTTP request and
//! returns its stdout as JSON.

pub mod aggregator;
pub mod bridge;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod translator;
pub mod transport;
pub mod worker;

pub use bridge::ScrapeBridge;
pub use config::{BridgeConfig, ConfigError, Settings, WorkerCommand};
pub use error::{BridgeError, SpawnError};
pub use request::ScrapeRequest;
pub use response::ScrapeResponse;
pub use translator::{WorkerOutcome, translate};
pub use worker::{CommandSpawner, WorkerHandle, WorkerSpawner};
