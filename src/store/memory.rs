use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DELETE_CHUNK_SIZE, OAuthTokenRecord, SongStore};
use crate::pipeline::select::{OAUTH_TOKEN_KEY, Song};

#[derive(Debug, Clone)]
enum Item {
    Song(Box<Song>),
    Token(OAuthTokenRecord),
}

/// In-process [`SongStore`] used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySongStore {
    items: RwLock<BTreeMap<String, Item>>,
}

impl MemorySongStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, the token record included.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl SongStore for MemorySongStore {
    async fn get_song(&self, id: &str) -> Result<Option<Song>> {
        let items = self.items.read().await;
        Ok(match items.get(id) {
            Some(Item::Song(song)) => Some(song.as_ref().clone()),
            _ => None,
        })
    }

    async fn put_song(&self, song: &Song) -> Result<()> {
        self.items
            .write()
            .await
            .insert(song.id.clone(), Item::Song(Box::new(song.clone())));
        Ok(())
    }

    async fn put_songs(&self, songs: &[Song]) -> Result<usize> {
        let mut items = self.items.write().await;
        for song in songs {
            items.insert(song.id.clone(), Item::Song(Box::new(song.clone())));
        }
        Ok(songs.len())
    }

    async fn scan_songs(&self) -> Result<Vec<Song>> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|(key, _)| key.as_str() != OAUTH_TOKEN_KEY)
            .filter_map(|(_, item)| match item {
                Item::Song(song) => Some(song.as_ref().clone()),
                Item::Token(_) => None,
            })
            .collect())
    }

    async fn batch_delete(&self, ids: &[String]) -> Result<u64> {
        let mut items = self.items.write().await;
        let mut removed = 0;
        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            for id in chunk {
                if items.remove(id).is_some() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn purge(&self, exclude: &[&str]) -> Result<u64> {
        let doomed: Vec<String> = {
            let items = self.items.read().await;
            items
                .keys()
                .filter(|key| !exclude.contains(&key.as_str()))
                .cloned()
                .collect()
        };
        self.batch_delete(&doomed).await
    }

    async fn get_token(&self) -> Result<Option<OAuthTokenRecord>> {
        let items = self.items.read().await;
        Ok(match items.get(OAUTH_TOKEN_KEY) {
            Some(Item::Token(token)) => Some(token.clone()),
            _ => None,
        })
    }

    async fn put_token(&self, token: &OAuthTokenRecord) -> Result<()> {
        self.items
            .write()
            .await
            .insert(OAUTH_TOKEN_KEY.to_string(), Item::Token(token.clone()));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
