//! finquiz-client: HTTP clients for the platform and the scoring oracle.
//!
//! Implements the `CatalogSource`, `ScoringOracle` and `ResultSink` traits
//! over JSON/HTTP, and loads the `finquiz.toml` configuration that wires them.

pub mod catalog;
pub mod config;
pub mod error;
mod http;
pub mod mock;
pub mod oracle;
pub mod results;

pub use catalog::HttpCatalogClient;
pub use config::{load_config, load_config_from, FinquizConfig};
pub use error::ClientError;
pub use oracle::HttpScoringOracle;
pub use results::HttpResultClient;
