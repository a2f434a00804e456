//! Less-popular song selection.
//!
//! Stored songs are split by roster cohort and category, ranked by views,
//! sampled with a tail-heavy weighting and re-ranked for presentation.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::scheduler::RunContext;

pub mod classify;
pub mod rank;
pub mod sampler;
pub mod types;

pub use classify::{SECONDARY_ROSTER_MARKER, classify};
pub use rank::rank_by_popularity;
pub use sampler::{RngSource, UniformSource, percentile_weight, weighted_sample};
pub use types::{
    CategoryBuckets, ChannelRef, Cohort, CuratedSelection, OAUTH_TOKEN_KEY, Song, SongCategory,
};

/// Extra candidates drawn beyond the pick count so that failed playlist
/// insertions can be replaced.
pub const DEFAULT_OVERAGE: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("song {song_id} has no owning channel")]
    MissingChannel { song_id: String },
}

/// How many songs to draw per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub pick_count: usize,
    pub overage: usize,
}

impl SelectionPolicy {
    #[must_use]
    pub const fn new(pick_count: usize, overage: usize) -> Self {
        Self {
            pick_count,
            overage,
        }
    }

    /// Number of draws for a list of `available` candidates.
    #[must_use]
    pub fn draw_count(&self, available: usize) -> usize {
        self.pick_count.saturating_add(self.overage).min(available)
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new(50, DEFAULT_OVERAGE)
    }
}

/// Split songs into cohort buckets, dropping the reserved token record.
///
/// # Errors
/// Fails when any song lacks an owning channel.
pub fn group_by_cohort(songs: &[Song]) -> Result<CuratedSelection, SelectionError> {
    let mut grouped = CuratedSelection::default();
    for song in songs.iter().filter(|song| song.id != OAUTH_TOKEN_KEY) {
        match classify(song)? {
            Cohort::Secondary => grouped.stars.push(song.clone()),
            Cohort::Primary => grouped.girls.push(song.clone()),
        }
    }
    Ok(grouped)
}

/// Pick less popular songs for every cohort and category.
///
/// Each of the four lists is ranked, sampled and re-ranked independently.
/// An empty input produces four empty lists.
///
/// # Errors
/// Fails when any song lacks an owning channel.
pub fn pick_curated_songs(
    songs: &[Song],
    policy: SelectionPolicy,
    source: &mut dyn UniformSource,
) -> Result<CuratedSelection, SelectionError> {
    let grouped = group_by_cohort(songs)?;

    debug!(
        stars_originals = grouped.stars.originals.len(),
        stars_covers = grouped.stars.covers.len(),
        girls_originals = grouped.girls.originals.len(),
        girls_covers = grouped.girls.covers.len(),
        "grouped songs by cohort"
    );

    let mut pick = |candidates: Vec<Song>| {
        let ranked = rank_by_popularity(&candidates);
        let draws = policy.draw_count(ranked.len());
        let sampled = weighted_sample(&ranked, draws, &mut *source);
        rank_by_popularity(&sampled)
    };

    let stars = grouped.stars.map(&mut pick);
    let girls = grouped.girls.map(&mut pick);

    Ok(CuratedSelection { stars, girls })
}

/// Pipeline stage wrapping [`pick_curated_songs`] with a fresh random source.
#[async_trait]
pub(crate) trait SelectStage: Send + Sync {
    async fn select(
        &self,
        run: &RunContext,
        songs: Vec<Song>,
    ) -> anyhow::Result<CuratedSelection>;
}

pub(crate) struct WeightedSelectStage {
    policy: SelectionPolicy,
}

impl WeightedSelectStage {
    pub(crate) fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl SelectStage for WeightedSelectStage {
    async fn select(
        &self,
        run: &RunContext,
        songs: Vec<Song>,
    ) -> anyhow::Result<CuratedSelection> {
        let mut source = RngSource::from_entropy();
        let selection = pick_curated_songs(&songs, self.policy, &mut source)?;
        info!(
            run_id = %run.run_id,
            candidates = songs.len(),
            picked = selection.total(),
            stars_originals = selection.stars.originals.len(),
            stars_covers = selection.stars.covers.len(),
            girls_originals = selection.girls.originals.len(),
            girls_covers = selection.girls.covers.len(),
            "picked less popular songs"
        );
        Ok(selection)
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::sampler::tests::FixedDraws;
    use super::test_support::{girl_song, song, star_song};
    use super::*;

    fn ids(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_four_empty_lists() {
        let mut source = RngSource::seeded(1);

        let picked = pick_curated_songs(&[], SelectionPolicy::default(), &mut source)
            .expect("empty input is valid");

        assert_eq!(picked, CuratedSelection::default());
        assert!(picked.stars.originals.is_empty());
        assert!(picked.stars.covers.is_empty());
        assert!(picked.girls.originals.is_empty());
        assert!(picked.girls.covers.is_empty());
    }

    #[test]
    fn small_lists_are_returned_whole_and_re_ranked() {
        let songs = vec![
            girl_song("o-10", "10", SongCategory::Original),
            girl_song("c-1", "1", SongCategory::Cover),
            girl_song("o-100", "100", SongCategory::Original),
            girl_song("c-50", "50", SongCategory::Cover),
        ];
        let mut source = RngSource::seeded(42);

        let picked = pick_curated_songs(&songs, SelectionPolicy::new(2, 10), &mut source)
            .expect("valid songs");

        assert_eq!(ids(&picked.girls.originals), ["o-100", "o-10"]);
        assert_eq!(ids(&picked.girls.covers), ["c-50", "c-1"]);
        assert!(picked.stars.is_empty());
    }

    #[test]
    fn cohorts_are_isolated_within_one_batch() {
        let plain = girl_song("solo", "5", SongCategory::Cover);
        let mut collab = girl_song("collab", "7", SongCategory::Cover);
        collab.mentions = vec![ChannelRef::new("UC-x", "Astel Leda").with_suborg("HOLOSTARS 2nd")];
        let songs = vec![
            plain,
            collab,
            star_song("star", "9", SongCategory::Original),
        ];
        let mut source = RngSource::seeded(9);

        let picked = pick_curated_songs(&songs, SelectionPolicy::default(), &mut source)
            .expect("valid songs");

        assert_eq!(ids(&picked.girls.covers), ["solo"]);
        assert_eq!(ids(&picked.stars.covers), ["collab"]);
        assert_eq!(ids(&picked.stars.originals), ["star"]);
        assert!(picked.girls.originals.is_empty());
    }

    #[test]
    fn reserved_token_record_is_excluded() {
        let mut token = song(OAUTH_TOKEN_KEY, "999999");
        token.song_type = SongCategory::Original;
        let songs = vec![token, girl_song("real", "3", SongCategory::Original)];
        let mut source = RngSource::seeded(5);

        let picked = pick_curated_songs(&songs, SelectionPolicy::default(), &mut source)
            .expect("valid songs");

        assert_eq!(ids(&picked.girls.originals), ["real"]);
    }

    #[test]
    fn draws_pick_plus_overage_and_never_repeat() {
        let songs: Vec<Song> = (0..200)
            .map(|i| girl_song(&format!("s{i}"), &(i * 7).to_string(), SongCategory::Cover))
            .collect();
        let mut source = RngSource::seeded(11);

        let picked = pick_curated_songs(&songs, SelectionPolicy::new(50, 10), &mut source)
            .expect("valid songs");
        let covers = &picked.girls.covers;
        let unique: HashSet<&str> = covers.iter().map(|s| s.id.as_str()).collect();

        assert_eq!(covers.len(), 60);
        assert_eq!(unique.len(), 60);
        assert!(
            covers
                .windows(2)
                .all(|pair| pair[0].popularity() >= pair[1].popularity())
        );
    }

    #[test]
    fn single_pick_from_hundred_favours_least_viewed() {
        let songs: Vec<Song> = (0..100)
            .map(|i| girl_song(&format!("s{i}"), &(1000 - i).to_string(), SongCategory::Original))
            .collect();
        let policy = SelectionPolicy::new(1, 0);
        let mut source = RngSource::seeded(2024);
        let mut top = 0usize;
        let mut bottom = 0usize;

        for _ in 0..10_000 {
            let picked = pick_curated_songs(&songs, policy, &mut source).expect("valid songs");
            assert_eq!(picked.girls.originals.len(), 1);
            match picked.girls.originals[0].id.as_str() {
                "s0" => top += 1,
                "s99" => bottom += 1,
                _ => {}
            }
        }

        assert!(bottom > 20 * top.max(1), "bottom {bottom} vs top {top}");
    }

    #[test]
    fn fixed_draws_are_reproducible() {
        let songs: Vec<Song> = (0..5)
            .map(|i| girl_song(&format!("s{i}"), &(100 - i).to_string(), SongCategory::Original))
            .collect();
        let policy = SelectionPolicy::new(2, 0);

        let first = pick_curated_songs(&songs, policy, &mut FixedDraws::new(vec![0.99]))
            .expect("valid songs");
        let second = pick_curated_songs(&songs, policy, &mut FixedDraws::new(vec![0.99]))
            .expect("valid songs");

        assert_eq!(first, second);
        assert_eq!(ids(&first.girls.originals), ["s3", "s4"]);
    }

    #[test]
    fn missing_channel_fails_the_whole_selection() {
        let mut broken = song("broken", "1");
        broken.channel.id = String::new();
        let mut source = RngSource::seeded(1);

        let err = pick_curated_songs(&[broken], SelectionPolicy::default(), &mut source)
            .expect_err("contract violation");

        assert_eq!(
            err,
            SelectionError::MissingChannel {
                song_id: "broken".to_string()
            }
        );
    }

    #[test]
    fn policy_caps_draws_at_available() {
        let policy = SelectionPolicy::new(50, 10);
        assert_eq!(policy.draw_count(4), 4);
        assert_eq!(policy.draw_count(100), 60);
        assert_eq!(policy.draw_count(0), 0);
    }
}
