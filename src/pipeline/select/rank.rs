//! Popularity ranking.

use std::cmp::Reverse;

use super::types::Song;

/// Return `songs` ordered by descending view count.
///
/// The sort is stable, so equal counts keep their incoming order. Songs whose
/// count cannot be parsed sort after every numeric count.
#[must_use]
pub fn rank_by_popularity(songs: &[Song]) -> Vec<Song> {
    let mut ranked = songs.to_vec();
    sort_by_popularity(&mut ranked);
    ranked
}

pub(crate) fn sort_by_popularity(songs: &mut [Song]) {
    songs.sort_by_key(|song| Reverse(song.popularity()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::select::test_support::song;

    fn ids(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn orders_by_views_descending() {
        let songs = vec![song("a", "10"), song("b", "1000"), song("c", "55")];

        let ranked = rank_by_popularity(&songs);

        assert_eq!(ids(&ranked), ["b", "c", "a"]);
        assert_eq!(ids(&songs), ["a", "b", "c"], "input must not be reordered");
    }

    #[test]
    fn unparseable_counts_sort_last() {
        let songs = vec![
            song("blank", ""),
            song("zero", "0"),
            song("junk", "n/a"),
            song("big", "9000"),
        ];

        let ranked = rank_by_popularity(&songs);

        assert_eq!(ids(&ranked), ["big", "zero", "blank", "junk"]);
    }

    #[test]
    fn ties_keep_incoming_order() {
        let songs = vec![
            song("first", "5"),
            song("second", "5"),
            song("top", "7"),
            song("third", "5"),
        ];

        let ranked = rank_by_popularity(&songs);

        assert_eq!(ids(&ranked), ["top", "first", "second", "third"]);
    }

    #[test]
    fn re_ranking_is_idempotent() {
        let songs = vec![
            song("a", "3"),
            song("b", "3"),
            song("c", "x"),
            song("d", "100"),
            song("e", "3"),
        ];

        let once = rank_by_popularity(&songs);
        let twice = rank_by_popularity(&once);

        assert_eq!(once, twice);
        assert!(
            once.windows(2)
                .all(|pair| pair[0].popularity() >= pair[1].popularity())
        );
    }
}
