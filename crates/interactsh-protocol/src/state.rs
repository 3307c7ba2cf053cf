//! The Protocol Client state machine (spec §4.2).

/// Runtime state of one `ProtocolClient`.
///
/// Transitions (spec §4.2):
/// - `Idle` --start_polling--> `Polling`
/// - `Polling` --stop_polling / SessionExpired--> `Idle`
/// - `Idle` --close--> `Closed` (terminal)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Polling,
    Closed,
}
