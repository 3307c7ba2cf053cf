//! URL-to-interaction attribution (spec §4.4 `on_interaction` step 2).
//!
//! The source both prefix-matches and exact-matches `full_id` against a
//! minted `unique_id`; the source does not resolve which should win when
//! more than one `ActiveUrl` matches. This implementation picks the most
//! recently minted match (spec §9 Open Questions: "implementers should
//! choose most-recent-wins and document the choice").

use interactsh_types::ActiveUrl;

/// Find the most recently minted `ActiveUrl` whose `unique_id` is a
/// prefix of, or exactly equal to, `full_id`. Considers both active and
/// disabled URLs — the caller decides what to do with a disabled match
/// (spec §4.4 step 4: found-but-disabled is dropped, not "not found").
pub fn find_matching_url<'a>(active_urls: &'a [ActiveUrl], full_id: &str) -> Option<&'a ActiveUrl> {
    active_urls
        .iter()
        .rev()
        .find(|u| full_id == u.unique_id || full_id.starts_with(u.unique_id.as_str()))
}
