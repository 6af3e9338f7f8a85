//! SurrealDB-backed dimensional mirror for star-sync
//!
//! Implements [`star_core::MirrorStore`] with the SurrealDB v2 SDK. Every
//! batch is sent as a single `BEGIN TRANSACTION ... COMMIT TRANSACTION`
//! query, so a failed batch leaves its table untouched.

mod connect;
pub mod schema;
mod store;

pub use connect::{mirror_connect, MirrorOpts, DEFAULT_MIRROR_URL};
pub use store::SurrealMirror;

/// Connect and wrap the client in a [`SurrealMirror`].
pub async fn connect(opts: &MirrorOpts) -> anyhow::Result<SurrealMirror> {
    Ok(SurrealMirror::new(mirror_connect(opts).await?))
}
