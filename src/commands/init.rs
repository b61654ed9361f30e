use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory, its `.secrets` subdirectory and an initial `config.json` file that
/// points at `api_url`.
///
/// # Arguments
/// - `expenses_home` - The directory that will be the root of the home directory, e.g.
///   `$HOME/expenses`
/// - `api_url` - The base address of the expense service, e.g. `http://127.0.0.1:8000/`
///
/// # Errors
/// - Returns an error if `api_url` is not an http(s) address or if any file operations fail.
pub async fn init(expenses_home: &Path, api_url: &str) -> Result<Out<()>> {
    let config = Config::create(expenses_home, api_url)
        .await
        .context("Unable to create the home directory and config")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Created {} for the server at {}",
        config.root().display(),
        config.api_url()
    )
    .into())
}
