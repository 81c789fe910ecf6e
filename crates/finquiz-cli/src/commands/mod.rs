pub mod catalog;
pub mod init;
pub mod take;
pub mod validate;

use std::path::Path;

use anyhow::Result;

use finquiz_client::FinquizConfig;
use finquiz_core::catalog::{load_catalog, Catalog};
use finquiz_core::parser::LocalCatalog;

/// Load the catalog from a local bank when given, else from the platform.
pub(crate) async fn load(bank: Option<&Path>, config: &FinquizConfig) -> Result<Catalog> {
    let catalog = match bank {
        Some(path) => load_catalog(&LocalCatalog::from_path(path)?).await?,
        None => load_catalog(&config.catalog_client()?).await?,
    };
    Ok(catalog)
}

