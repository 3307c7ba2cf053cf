//! Server-list randomization helper (SPEC_FULL §10.5): Interactsh clients
//! commonly ship a short list of public servers and pick one at random for
//! the zero-configuration case (e.g. a UI's "random server" button, which
//! calls [`Manager::initialize_clients`](crate::Manager::initialize_clients)
//! eagerly against every entry so the first mint on any of them is
//! instantaneous).

use rand::seq::SliceRandom;

/// Public Interactsh servers commonly bundled with the protocol family.
pub const DEFAULT_SERVERS: &[&str] = &[
    "oast.site",
    "oast.fun",
    "oast.me",
    "oast.pro",
    "oast.live",
    "oast.online",
];

/// Pick one server uniformly at random from `servers`. Panics only if
/// `servers` is empty — callers pass a known-non-empty list such as
/// [`DEFAULT_SERVERS`].
pub fn pick_random_server(servers: &[String]) -> &str {
    let mut rng = rand::thread_rng();
    servers
        .choose(&mut rng)
        .map(String::as_str)
        .expect("server list must not be empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_servers_is_non_empty() {
        assert!(!DEFAULT_SERVERS.is_empty());
    }

    #[test]
    fn pick_random_server_returns_a_listed_entry() {
        let servers: Vec<String> = DEFAULT_SERVERS.iter().map(|s| s.to_string()).collect();
        let picked = pick_random_server(&servers);
        assert!(DEFAULT_SERVERS.contains(&picked));
    }
}
