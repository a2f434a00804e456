pub(crate) mod discord;
pub(crate) mod google_oauth;
pub(crate) mod holodex;
pub(crate) mod youtube;

pub(crate) use discord::{DiscordClient, Notifier};
pub(crate) use google_oauth::GoogleOAuthClient;
pub(crate) use holodex::HolodexClient;
pub(crate) use youtube::YouTubeClient;
