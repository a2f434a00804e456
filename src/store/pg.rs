/// PostgreSQL上のキーバリュー型楽曲テーブル。
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row, types::Json};
use tracing::{debug, warn};

use super::{DELETE_CHUNK_SIZE, OAuthTokenRecord, SongStore};
use crate::pipeline::select::{OAUTH_TOKEN_KEY, Song};

/// `hololive_songs` テーブルを扱うストア。
#[derive(Debug, Clone)]
pub struct PgSongStore {
    pool: PgPool,
}

impl PgSongStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// テーブルが無ければ作成する。
    ///
    /// # Errors
    /// DDLの実行に失敗した場合はエラーを返す。
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS hololive_songs (
                id TEXT PRIMARY KEY,
                item JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(&self.pool)
        .await
        .context("failed to create hololive_songs table")?;
        Ok(())
    }

    async fn get_item(&self, id: &str) -> Result<Option<Value>> {
        let row = sqlx::query(r"SELECT item FROM hololive_songs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load item {id}"))?;

        Ok(row.map(|row| row.get::<Json<Value>, _>("item").0))
    }

    async fn put_item<'e, E>(executor: E, id: &str, item: Value) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO hololive_songs (id, item, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO UPDATE
            SET item = EXCLUDED.item, updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(id)
        .bind(Json(item))
        .execute(executor)
        .await
        .with_context(|| format!("failed to upsert item {id}"))?;
        Ok(())
    }
}

#[async_trait]
impl SongStore for PgSongStore {
    async fn get_song(&self, id: &str) -> Result<Option<Song>> {
        if id == OAUTH_TOKEN_KEY {
            return Ok(None);
        }
        self.get_item(id)
            .await?
            .map(|item| serde_json::from_value(item).context("stored song is malformed"))
            .transpose()
    }

    async fn put_song(&self, song: &Song) -> Result<()> {
        let item = serde_json::to_value(song).context("failed to serialize song")?;
        Self::put_item(&self.pool, &song.id, item).await
    }

    async fn put_songs(&self, songs: &[Song]) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        for song in songs {
            let item = serde_json::to_value(song).context("failed to serialize song")?;
            Self::put_item(&mut *tx, &song.id, item).await?;
        }

        tx.commit().await.context("failed to commit song upserts")?;
        Ok(songs.len())
    }

    async fn scan_songs(&self) -> Result<Vec<Song>> {
        let rows = sqlx::query(r"SELECT id, item FROM hololive_songs WHERE id <> $1")
            .bind(OAUTH_TOKEN_KEY)
            .fetch_all(&self.pool)
            .await
            .context("failed to scan hololive_songs")?;

        let mut songs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let item: Json<Value> = row.get("item");
            match serde_json::from_value::<Song>(item.0) {
                Ok(song) => songs.push(song),
                Err(error) => warn!(song_id = %id, %error, "skipping malformed song record"),
            }
        }

        debug!(count = songs.len(), "scanned songs");
        Ok(songs)
    }

    async fn batch_delete(&self, ids: &[String]) -> Result<u64> {
        let mut removed = 0;
        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            let result = sqlx::query(r"DELETE FROM hololive_songs WHERE id = ANY($1)")
                .bind(chunk)
                .execute(&self.pool)
                .await
                .context("failed to delete song chunk")?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }

    async fn purge(&self, exclude: &[&str]) -> Result<u64> {
        let exclude: Vec<String> = exclude.iter().map(ToString::to_string).collect();
        let ids: Vec<String> = sqlx::query(r"SELECT id FROM hololive_songs WHERE id <> ALL($1)")
            .bind(&exclude)
            .fetch_all(&self.pool)
            .await
            .context("failed to list keys for purge")?
            .into_iter()
            .map(|row| row.get("id"))
            .collect();

        let removed = self.batch_delete(&ids).await?;
        debug!(removed, kept = exclude.len(), "purged song table");
        Ok(removed)
    }

    async fn get_token(&self) -> Result<Option<OAuthTokenRecord>> {
        self.get_item(OAUTH_TOKEN_KEY)
            .await?
            .map(|item| serde_json::from_value(item).context("stored oauth token is malformed"))
            .transpose()
    }

    async fn put_token(&self, token: &OAuthTokenRecord) -> Result<()> {
        let item = serde_json::to_value(token).context("failed to serialize oauth token")?;
        Self::put_item(&self.pool, OAUTH_TOKEN_KEY, item).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("song store ping failed")?;
        Ok(())
    }
}
