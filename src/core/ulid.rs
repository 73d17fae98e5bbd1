use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::core::error::{Error, ErrorKind, Result};

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Encode a 128-bit value as a 26-character Crockford base32 ULID string.
pub fn encode(value: u128) -> String {
    let mut buf = [0u8; 26];
    let mut v = value;
    for slot in buf.iter_mut().rev() {
        *slot = CROCKFORD[(v & 0x1F) as usize];
        v >>= 5;
    }
    String::from_utf8(buf.to_vec()).expect("crockford alphabet is ASCII")
}

/// Decode a 26-character Crockford base32 ULID string, case-insensitively.
pub fn decode(s: &str) -> Option<u128> {
    if s.len() != 26 {
        return None;
    }
    let mut v: u128 = 0;
    for c in s.bytes() {
        v = (v << 5) | crockford_value(c)? as u128;
    }
    Some(v)
}

fn crockford_value(c: u8) -> Option<u8> {
    let c = c.to_ascii_uppercase();
    CROCKFORD.iter().position(|&x| x == c).map(|p| p as u8)
}

/// Strictly-monotonic ULID generator. Within the same millisecond, the
/// 80-bit random tail is incremented rather than re-rolled, so repeated
/// calls in a tight loop still sort in call order.
pub struct MonotonicGenerator {
    state: Mutex<Option<(u64, u128)>>,
}

impl MonotonicGenerator {
    pub fn new() -> Self {
        MonotonicGenerator {
            state: Mutex::new(None),
        }
    }

    /// Resumes from the last doc_id issued by a previous process (read back
    /// from `meta.bin`), so a restart within the same millisecond still
    /// produces strictly greater ids instead of re-rolling a smaller one.
    pub fn seeded(last: u128) -> Self {
        let ts = (last >> 80) as u64;
        let rand = last & ((1u128 << 80) - 1);
        MonotonicGenerator {
            state: Mutex::new(Some((ts, rand))),
        }
    }

    pub fn next(&self) -> Result<u128> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::new(ErrorKind::IndexAdd, format!("system clock before epoch: {}", e)))?
            .as_millis() as u64
            & 0xFFFF_FFFF_FFFF; // 48 bits

        let mut guard = self.state.lock().unwrap();
        let (ts, rand_part) = match *guard {
            Some((last_ts, last_rand)) if last_ts == now_ms => {
                let next_rand = last_rand.checked_add(1).ok_or_else(|| {
                    Error::new(
                        ErrorKind::IndexAdd,
                        "ULID randomness exhausted within one millisecond".to_string(),
                    )
                })?;
                (last_ts, next_rand)
            }
            Some((last_ts, _)) if last_ts > now_ms => {
                return Err(Error::new(
                    ErrorKind::IndexAdd,
                    "system clock moved backwards".to_string(),
                ));
            }
            _ => (now_ms, random_80_bits()),
        };

        *guard = Some((ts, rand_part));
        Ok(((ts as u128) << 80) | rand_part)
    }
}

impl Default for MonotonicGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn random_80_bits() -> u128 {
    let mut rng = rand::thread_rng();
    let hi = rng.next_u64() as u128;
    let lo = (rng.next_u32() as u128) & 0xFFFF;
    (hi << 16) | lo
}
