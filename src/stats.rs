use serde::{Deserialize, Serialize};

/// Route shared by the proxy server and the in-page loader.
pub const SOCIAL_STATS_PATH: &str = "/.netlify/functions/social-stats";

pub const STAT_KEY_INSTAGRAM_FOLLOWERS: &str = "ig-followers";
pub const STAT_KEY_YOUTUBE_SUBSCRIBERS: &str = "yt-subs";
pub const STAT_KEY_YOUTUBE_VIEWS: &str = "yt-views";

/// Flattened counts returned by the stats proxy. A field is `None` when its
/// upstream was not configured or answered without usable data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialStats {
    pub instagram_followers: Option<u64>,
    pub youtube_subscribers: Option<u64>,
    pub youtube_views: Option<u64>,
}

impl SocialStats {
    /// `(data-stat key, data-target value)` pairs for the counter elements.
    /// Missing and zero counts are skipped so the page keeps its placeholders.
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    pub fn stat_targets(&self) -> Vec<(&'static str, String)> {
        [
            (STAT_KEY_INSTAGRAM_FOLLOWERS, self.instagram_followers),
            (STAT_KEY_YOUTUBE_SUBSCRIBERS, self.youtube_subscribers),
            (STAT_KEY_YOUTUBE_VIEWS, self.youtube_views),
        ]
        .into_iter()
        .filter_map(|(key, value)| match value {
            Some(count) if count > 0 => Some((key, count.to_string())),
            _ => None,
        })
        .collect()
    }
}
