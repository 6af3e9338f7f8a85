//! Mirror connection setup.

use anyhow::{Context, Result};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;

/// Default mirror: an embedded, file-backed SurrealKV store in the working
/// directory.
pub const DEFAULT_MIRROR_URL: &str = "surrealkv://analytics_sakila.db";

/// Mirror connection options
#[derive(Clone, Debug)]
pub struct MirrorOpts {
    /// Endpoint: `surrealkv://<path>`, `mem://`, `ws://host:port`, ...
    pub mirror_url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials, only needed for remote servers.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl MirrorOpts {
    /// Options for a fresh in-memory mirror.
    pub fn in_memory() -> Self {
        Self {
            mirror_url: "mem://".to_string(),
            namespace: "analytics".to_string(),
            database: "sakila".to_string(),
            username: None,
            password: None,
        }
    }
}

pub async fn mirror_connect(opts: &MirrorOpts) -> Result<Surreal<Any>> {
    let endpoint = opts
        .mirror_url
        .replace("http://", "ws://")
        .replace("https://", "wss://");

    tracing::debug!("Connecting to mirror at {}", endpoint);

    let surreal = surrealdb::engine::any::connect(endpoint.as_str())
        .await
        .with_context(|| format!("Failed to connect to mirror at '{endpoint}'"))?;

    if let (Some(username), Some(password)) = (&opts.username, &opts.password) {
        surreal
            .signin(surrealdb::opt::auth::Root {
                username,
                password,
            })
            .await
            .context("Failed to sign in to mirror")?;
    }

    surreal
        .use_ns(&opts.namespace)
        .use_db(&opts.database)
        .await?;

    Ok(surreal)
}
