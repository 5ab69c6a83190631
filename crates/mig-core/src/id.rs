//! Identifier generation.
//!
//! An ID is 64 bits: the current Unix time in seconds in the high 32 bits and
//! a checksum in the low 32 bits. The checksum is a truncated SHA-256 over a
//! nanosecond timestamp and a random value, so nodes that never talk to each
//! other are unlikely to collide. Uniqueness is best-effort, not guaranteed.
//!
//! Within one second a generator issues the first ID from a fresh checksum
//! and steps the low word forward for each following call. The checksum is
//! 31 bits wide, leaving the top bit as headroom: a generator can issue 2^31
//! IDs in one second before the low word would wrap, so in practice its IDs
//! never repeat and never go backwards.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::{Digest, Sha256};
use std::sync::{Mutex, PoisonError};

/// Top bit of the low word is reserved for same-second increments.
const CHECKSUM_MASK: u32 = 0x7fff_ffff;

const RADIX32_DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

struct State<R> {
    rng: R,
    last_second: Option<u64>,
    low: u32,
}

/// Thread-safe ID source owning its randomness.
pub struct IdGenerator<R = StdRng> {
    state: Mutex<State<R>>,
}

impl IdGenerator<StdRng> {
    /// Generator seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for IdGenerator<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> IdGenerator<R> {
    /// Generator drawing randomness from `rng`. Pass a seeded RNG for
    /// reproducible sequences.
    pub fn with_rng(rng: R) -> Self {
        Self {
            state: Mutex::new(State {
                rng,
                last_second: None,
                low: 0,
            }),
        }
    }

    pub fn generate(&self) -> u64 {
        self.generate_at(Utc::now())
    }

    /// The next ID rendered in radix 32 (`0-9a-v`).
    pub fn generate_base32(&self) -> String {
        to_base32(self.generate())
    }

    pub fn generate_at(&self, now: DateTime<Utc>) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let second = (now.timestamp().max(0) as u64) & 0xffff_ffff;

        let low = if state.last_second == Some(second) {
            state.low.wrapping_add(1)
        } else {
            let nonce = state.rng.next_u64();
            checksum(&now, nonce)
        };
        state.last_second = Some(second);
        state.low = low;

        (second << 32) | u64::from(low)
    }
}

fn checksum(now: &DateTime<Utc>, nonce: u64) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(now.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    let digest = hasher.finalize();
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) & CHECKSUM_MASK
}

/// Unix seconds encoded in the high word of `id`.
pub fn timestamp_of(id: u64) -> i64 {
    (id >> 32) as i64
}

pub fn to_base32(mut id: u64) -> String {
    if id == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while id > 0 {
        digits.push(RADIX32_DIGITS[(id % 32) as usize]);
        id /= 32;
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}
