//! Session identifier shape: `"<protocolVersion>_<128-bit-random-hex>"`.
//! The version is recoverable from the id alone, independent of storage,
//! which lets the engine cross-check a session's negotiated version against
//! its id without a storage round-trip.

use rand::RngCore;

/// Generate a new session id for `protocol_version`.
pub fn generate(protocol_version: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{protocol_version}_{hex}")
}

/// Recover the protocol version prefix encoded in a session id.
///
/// Returns `None` if the id doesn't contain the `_` separator -- callers
/// should treat that as an invalid/unrecognized session id.
pub fn version_prefix(session_id: &str) -> Option<&str> {
    session_id.split_once('_').map(|(version, _)| version)
}
