//! Roster classification.

use super::SelectionError;
use super::types::{ChannelRef, Cohort, Song};

/// Substring identifying the secondary roster in a channel's suborg or name.
pub const SECONDARY_ROSTER_MARKER: &str = "holostars";

fn matches_marker(channel: &ChannelRef) -> bool {
    let haystack = format!(
        "{}{}",
        channel.suborg.as_deref().unwrap_or_default(),
        channel.name
    );
    haystack.to_lowercase().contains(SECONDARY_ROSTER_MARKER)
}

/// Decide the cohort of a song from its owning channel and mentions.
///
/// # Errors
/// Returns [`SelectionError::MissingChannel`] when the owning channel has no id.
pub fn classify(song: &Song) -> Result<Cohort, SelectionError> {
    if song.channel.id.trim().is_empty() {
        return Err(SelectionError::MissingChannel {
            song_id: song.id.clone(),
        });
    }

    let secondary = std::iter::once(&song.channel)
        .chain(song.mentions.iter())
        .any(matches_marker);

    Ok(if secondary {
        Cohort::Secondary
    } else {
        Cohort::Primary
    })
}
