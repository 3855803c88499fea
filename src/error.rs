use thiserror::Error;

/// Transport failures reported by a playback engine.
///
/// These are non-fatal to the session: they collapse into a snapshot-visible
/// indicator and the session reverts to "not playing" with the loaded track
/// kept around for a retry. They are never returned to command issuers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportErrorKind {
    #[error("network unavailable")]
    NetworkUnavailable,
    #[error("decode failure")]
    DecodeFailure,
    #[error("invalid source")]
    InvalidSource,
}
