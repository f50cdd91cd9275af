/// One decoded report element from the inbound feed
///
/// Ephemeral: created by the stream parser, consumed exactly once by a
/// worker, never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub esn: String,
    pub payload: String,
}
