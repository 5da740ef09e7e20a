//! Pre-fetched secret lookup.
//!
//! Each secret comes from an environment variable holding the value, an
//! environment variable naming a file, or a file path from the config, in
//! that order.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use dxsync_platform::Credentials;

use crate::config::SecretFiles;

struct SecretSource {
    label: &'static str,
    value_var: &'static str,
    file_var: &'static str,
}

const APP_ID: SecretSource = SecretSource {
    label: "app id",
    value_var: "APP_ID",
    file_var: "APP_ID_SECRET_FILE",
};

const PRIVATE_KEY: SecretSource = SecretSource {
    label: "private key",
    value_var: "PRIVATE_KEY",
    file_var: "PRIVATE_KEY_SECRET_FILE",
};

const API_TOKEN: SecretSource = SecretSource {
    label: "API token",
    value_var: "DX_API_TOKEN",
    file_var: "DX_API_TOKEN_FILE",
};

/// Resolves and validates the credentials.
pub fn load_credentials(
    files: &SecretFiles,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Credentials> {
    let app_id = resolve(&APP_ID, files.app_id.as_deref(), &env)?;
    let private_key = resolve(&PRIVATE_KEY, files.private_key.as_deref(), &env)?;
    let api_token = resolve(&API_TOKEN, files.api_token.as_deref(), &env)?;

    Credentials::new(app_id.trim(), &private_key, api_token.trim())
        .context("invalid credentials")
}

fn resolve(
    source: &SecretSource,
    configured: Option<&Path>,
    env: &impl Fn(&str) -> Option<String>,
) -> anyhow::Result<String> {
    if let Some(value) = env(source.value_var).filter(|v| !v.trim().is_empty()) {
        return Ok(value);
    }

    let path = env(source.file_var)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| configured.map(Path::to_path_buf));

    match path {
        Some(path) => {
            let value = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {} from {}", source.label, path.display()))?;
            tracing::debug!(secret = source.label, path = %path.display(), "secret loaded from file");
            Ok(value)
        }
        None => bail!(
            "required secret not found: set {} or {}",
            source.value_var,
            source.file_var
        ),
    }
}
