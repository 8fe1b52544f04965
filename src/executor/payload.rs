//! Datagram payload construction
//!
//! Packets of at least [`HEADER_LEN`] bytes start with a header:
//!
//! | bytes  | content                                 |
//! |--------|-----------------------------------------|
//! | 0..8   | Unix timestamp in seconds, big-endian   |
//! | 8..16  | per-worker sequence number, big-endian  |
//! | 16..24 | random flag bytes                       |
//!
//! The remainder is random filler. Smaller packets are filler only.

use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of the timestamp/sequence/flags header
pub const HEADER_LEN: usize = 24;

/// Reusable payload buffer for one worker
pub struct PayloadBuilder {
    buffer: Vec<u8>,
    sequence: u64,
    rng: StdRng,
}

impl PayloadBuilder {
    /// Allocate a buffer of exactly `packet_size` bytes filled with random data
    pub fn new(packet_size: usize) -> Self {
        let mut rng = StdRng::from_entropy();
        let mut buffer = vec![0u8; packet_size];
        rng.fill_bytes(&mut buffer);

        Self {
            buffer,
            sequence: 0,
            rng,
        }
    }

    /// Stamp the header for the next packet and return the full datagram
    pub fn next_packet(&mut self) -> &[u8] {
        if self.buffer.len() >= HEADER_LEN {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);

            self.buffer[0..8].copy_from_slice(&timestamp.to_be_bytes());
            self.buffer[8..16].copy_from_slice(&self.sequence.to_be_bytes());
            self.rng.fill_bytes(&mut self.buffer[16..HEADER_LEN]);
        }

        self.sequence = self.sequence.wrapping_add(1);
        &self.buffer
    }

    /// Packets produced so far
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn packet_size(&self) -> usize {
        self.buffer.len()
    }
}
