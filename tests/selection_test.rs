//! End-to-end checks of the selection core through the public API.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use holo_pickup::pipeline::select::{
    ChannelRef, Cohort, OAUTH_TOKEN_KEY, RngSource, SelectionError, SelectionPolicy, Song,
    SongCategory, classify, pick_curated_songs, rank_by_popularity,
};
use rstest::rstest;

fn song(id: &str, views: &str, suborg: &str, category: SongCategory) -> Song {
    let at = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp");
    Song {
        id: id.to_string(),
        title: format!("song {id}"),
        channel_id: "UC1".to_string(),
        channel: ChannelRef::new("UC1", "talent").with_suborg(suborg),
        published_at: Some(at),
        available_at: None,
        song_type: category,
        duration: 200,
        status: "past".to_string(),
        youtube_view_count: views.to_string(),
        youtube_like_count: "0".to_string(),
        processed_at: at,
        mentions: Vec::new(),
        thumbnail_url: String::new(),
    }
}

#[rstest]
#[case("Holostars English -TEMPUS-", Cohort::Secondary)]
#[case("HOLOSTARS 3rd Gen", Cohort::Secondary)]
#[case("Myth", Cohort::Primary)]
#[case("", Cohort::Primary)]
fn roster_follows_owner_suborg(#[case] suborg: &str, #[case] expected: Cohort) {
    let song = song("x", "1", suborg, SongCategory::Original);
    assert_eq!(classify(&song), Ok(expected));
}

#[test]
fn ranking_puts_unparseable_counts_last() {
    let songs = vec![
        song("a", "12", "Myth", SongCategory::Cover),
        song("b", "n/a", "Myth", SongCategory::Cover),
        song("c", "300", "Myth", SongCategory::Cover),
    ];

    let ranked: Vec<String> = rank_by_popularity(&songs)
        .into_iter()
        .map(|s| s.id)
        .collect();

    assert_eq!(ranked, ["c", "a", "b"]);
}

#[test]
fn curated_lists_are_disjoint_and_bounded() {
    let mut songs: Vec<Song> = (0..120)
        .map(|i| {
            let suborg = if i % 3 == 0 { "Holostars 2nd Gen" } else { "Gamers" };
            let category = if i % 2 == 0 {
                SongCategory::Original
            } else {
                SongCategory::Cover
            };
            song(&format!("v{i}"), &(i * 13).to_string(), suborg, category)
        })
        .collect();
    songs.push(song(OAUTH_TOKEN_KEY, "0", "Gamers", SongCategory::Original));
    let policy = SelectionPolicy::new(10, 5);
    let mut source = RngSource::seeded(3);

    let picked = pick_curated_songs(&songs, policy, &mut source).expect("valid input");

    let lists = [
        &picked.stars.originals,
        &picked.stars.covers,
        &picked.girls.originals,
        &picked.girls.covers,
    ];
    let mut seen = HashSet::new();
    for list in lists {
        assert_eq!(list.len(), 15);
        assert!(list.iter().all(|s| seen.insert(s.id.clone())));
        assert!(
            list.windows(2)
                .all(|pair| pair[0].popularity() >= pair[1].popularity())
        );
    }
    assert!(!seen.contains(OAUTH_TOKEN_KEY));
}

#[test]
fn song_without_owner_is_rejected() {
    let mut broken = song("broken", "1", "Myth", SongCategory::Cover);
    broken.channel.id.clear();
    let mut source = RngSource::seeded(1);

    let result = pick_curated_songs(&[broken], SelectionPolicy::default(), &mut source);

    assert!(matches!(
        result,
        Err(SelectionError::MissingChannel { ref song_id }) if song_id == "broken"
    ));
}
