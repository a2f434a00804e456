//! Key-value persistence for songs and the OAuth token record.

pub(crate) mod memory;
pub mod models;
pub(crate) mod pg;

use anyhow::Result;
use async_trait::async_trait;

use crate::pipeline::select::Song;

pub use memory::MemorySongStore;
pub use models::OAuthTokenRecord;
pub use pg::PgSongStore;

/// Maximum number of keys removed per delete statement.
pub(crate) const DELETE_CHUNK_SIZE: usize = 25;

/// Song table keyed by video id. The reserved token key lives in the same
/// table but is never returned by song reads.
#[async_trait]
pub trait SongStore: Send + Sync {
    async fn get_song(&self, id: &str) -> Result<Option<Song>>;

    async fn put_song(&self, song: &Song) -> Result<()>;

    /// Upserts every song and returns how many were written.
    async fn put_songs(&self, songs: &[Song]) -> Result<usize>;

    /// All stored songs, excluding the reserved token record.
    async fn scan_songs(&self) -> Result<Vec<Song>>;

    /// Removes the given keys in chunks of [`DELETE_CHUNK_SIZE`].
    async fn batch_delete(&self, ids: &[String]) -> Result<u64>;

    /// Removes every record whose key is not in `exclude`.
    async fn purge(&self, exclude: &[&str]) -> Result<u64>;

    async fn get_token(&self) -> Result<Option<OAuthTokenRecord>>;

    async fn put_token(&self, token: &OAuthTokenRecord) -> Result<()>;

    /// Readiness check.
    async fn ping(&self) -> Result<()>;
}
