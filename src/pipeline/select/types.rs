//! Song selection domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the reserved record that holds YouTube OAuth state in the song table.
pub const OAUTH_TOKEN_KEY: &str = "YOUTUBE_OAUTH_TOKEN";

/// Song kind as reported by the catalog topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongCategory {
    Original,
    Cover,
}

impl SongCategory {
    pub const ALL: [Self; 2] = [Self::Original, Self::Cover];

    /// Holodex topic id used to search this category.
    #[must_use]
    pub fn topic(self) -> &'static str {
        match self {
            Self::Original => "Original_Song",
            Self::Cover => "Music_Cover",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Cover => "cover",
        }
    }
}

/// Talent roster grouping. Derived from a song, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    /// Hololive (everyone not matched by the marker).
    Primary,
    /// Holostars.
    Secondary,
}

impl Cohort {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Primary => "Hololive",
            Self::Secondary => "Holostars",
        }
    }
}

/// Channel reference attached to a song, either as owner or as a mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suborg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl ChannelRef {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            english_name: None,
            org: None,
            suborg: None,
            photo: None,
        }
    }

    #[must_use]
    pub fn with_suborg(mut self, suborg: impl Into<String>) -> Self {
        self.suborg = Some(suborg.into());
        self
    }

    /// Holodex prefixes suborg names with a two character sort key ("a Myth").
    #[must_use]
    pub fn strip_suborg_sort_key(mut self) -> Self {
        if let Some(suborg) = self.suborg.take() {
            let stripped: String = suborg.chars().skip(2).collect();
            self.suborg = Some(stripped);
        }
        self
    }
}

/// A music video as persisted after enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub channel_id: String,
    pub channel: ChannelRef,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub available_at: Option<DateTime<Utc>>,
    pub song_type: SongCategory,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub status: String,
    /// View count as returned by YouTube (a decimal string).
    #[serde(default)]
    pub youtube_view_count: String,
    #[serde(default)]
    pub youtube_like_count: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub mentions: Vec<ChannelRef>,
    #[serde(default)]
    pub thumbnail_url: String,
}

impl Song {
    /// Popularity used for ranking. Unparseable counts rank below every number.
    #[must_use]
    pub fn popularity(&self) -> Option<u64> {
        self.youtube_view_count.trim().parse::<u64>().ok()
    }
}

/// Songs of one cohort, split by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryBuckets {
    pub originals: Vec<Song>,
    pub covers: Vec<Song>,
}

impl CategoryBuckets {
    pub fn push(&mut self, song: Song) {
        match song.song_type {
            SongCategory::Original => self.originals.push(song),
            SongCategory::Cover => self.covers.push(song),
        }
    }

    #[must_use]
    pub fn get(&self, category: SongCategory) -> &[Song] {
        match category {
            SongCategory::Original => &self.originals,
            SongCategory::Cover => &self.covers,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.originals.len() + self.covers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.originals.is_empty() && self.covers.is_empty()
    }

    /// Applies `f` to both category lists.
    #[must_use]
    pub fn map(self, mut f: impl FnMut(Vec<Song>) -> Vec<Song>) -> Self {
        Self {
            originals: f(self.originals),
            covers: f(self.covers),
        }
    }
}

/// Curated output of one selection run: per cohort, per category, ordered by
/// descending popularity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CuratedSelection {
    /// Holostars picks.
    pub stars: CategoryBuckets,
    /// Hololive picks.
    pub girls: CategoryBuckets,
}

impl CuratedSelection {
    #[must_use]
    pub fn cohort(&self, cohort: Cohort) -> &CategoryBuckets {
        match cohort {
            Cohort::Primary => &self.girls,
            Cohort::Secondary => &self.stars,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.stars.len() + self.girls.len()
    }
}
