//! Application-wide constants for the optimization engine.
//!
//! This module centralizes the magic numbers that show up across the
//! buffer, broker, wire and client layers so they have one authoritative
//! definition instead of being re-typed at each call site.
//!
//! # Categories
//!
//! - **Wire protocol**: fixed-width framing
//! - **Broker**: port id space, default buffer sizing
//! - **Client**: connection/stall retry limits
//! - **Random factory**: producer thread count and ring sizing

use std::time::Duration;

// ============================================================================
// Identity
// ============================================================================

/// User-Agent-equivalent string for diagnostic/log output.
pub fn engine_agent() -> String {
    format!("evoengine/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Wire protocol
// ============================================================================

/// Width, in bytes, of every fixed-length ASCII header frame on the wire.
/// Shorter strings are right-padded with spaces; longer ones are a protocol
/// error. Matches the original engine's `COMMANDLENGTH`.
pub const COMMANDLENGTH: usize = 32;

/// Serialization mode tag values as sent on the wire (single ASCII digit,
/// padded to `COMMANDLENGTH` like every other header).
pub const SERMODE_BINARY: u8 = 0;
pub const SERMODE_TEXT: u8 = 1;
pub const SERMODE_XML: u8 = 2;

// ============================================================================
// Broker / buffer sizing
// ============================================================================

/// Default capacity of a `BoundedBufferWithId` ring when none is given.
pub const DEFAULT_BUFFER_SIZE: usize = 2000;

/// Upper bound on the number of ports a `Broker` will enrol before it
/// considers the id space exhausted. One below `u64::MAX` so the sentinel
/// value itself is never assigned, mirroring the original's
/// `numeric_limits<PORTIDTYPE>::max() - 1`.
pub const MAX_PORT_ID: u64 = u64::MAX - 1;

// ============================================================================
// Client connection / stall limits
// ============================================================================

/// Maximum number of consecutive connection attempts before a `Client`
/// gives up and returns `ClientError::ConnectExhausted`.
pub const MAX_CONNECTION_ATTEMPTS: u16 = 10;

/// Maximum number of consecutive "no work available" stalls before a
/// `Client` gives up and returns `ClientError::StallLimitReached`.
pub const MAX_STALLS: u16 = 10;

/// Initial backoff between connection attempts.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Ceiling for the exponential backoff between connection attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How long the server waits for a broker `get()` before replying
/// `timeout` to a `ready` request.
pub const SERVER_GET_TIMEOUT: Duration = Duration::from_millis(10);

// ============================================================================
// Random factory
// ============================================================================

/// Number of producer threads the `RandomFactory` singleton spawns.
pub const RANDOM_FACTORY_THREADS: usize = 4;

/// Capacity of each producer's pre-generated value ring.
pub const RANDOM_FACTORY_RING_SIZE: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commandlength_matches_original() {
        assert_eq!(COMMANDLENGTH, 32);
    }

    #[test]
    fn test_retry_limits_are_reasonable() {
        assert!(MAX_CONNECTION_ATTEMPTS >= 1);
        assert!(MAX_STALLS >= 1);
        assert!(INITIAL_BACKOFF < MAX_BACKOFF);
    }

    #[test]
    fn test_max_port_id_leaves_sentinel() {
        assert_eq!(MAX_PORT_ID, u64::MAX - 1);
    }
}
