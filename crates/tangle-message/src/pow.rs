//! Nonce search for message proof of work.
//!
//! A message's score is the number of leading zero bits of
//! `BLAKE3(pow domain ‖ BLAKE3(bytes without nonce) ‖ nonce_le)`. The prefix
//! hash is computed once per message so each attempt hashes only 40 bytes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tangle_crypto::ContentHasher;
use tracing::debug;

use crate::error::{MessageError, MessageResult};

/// Nonces tried by one worker before it re-checks the deadline.
const CHUNK_SIZE: u64 = 4096;

/// Largest meaningful difficulty: every bit of the digest zero.
pub const MAX_DIFFICULTY: u32 = 256;

/// Budget and parallelism for a nonce search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PowConfig {
    /// Required leading zero bits.
    pub difficulty: u32,
    /// Worker threads; 0 uses rayon's global pool.
    pub workers: usize,
    /// Nonces to try before giving up.
    pub max_attempts: u64,
    /// Wall-clock budget for the search.
    pub timeout: Duration,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty: 14,
            workers: 0,
            max_attempts: 1 << 32,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Why a search worker stopped early.
enum Halt {
    Found(u64),
    Expired,
}

/// Proof-of-work scoring and search.
pub struct ProofOfWork;

impl ProofOfWork {
    /// Hash of the message bytes preceding the nonce.
    pub fn prefix_hash(bytes_without_nonce: &[u8]) -> [u8; 32] {
        ContentHasher::raw_hash(bytes_without_nonce)
    }

    pub fn digest(prefix_hash: &[u8; 32], nonce: u64) -> [u8; 32] {
        ContentHasher::POW.hash_parts(&[prefix_hash.as_slice(), nonce.to_le_bytes().as_slice()])
    }

    /// Leading zero bits of a digest.
    pub fn score(digest: &[u8; 32]) -> u32 {
        let mut zeros = 0;
        for byte in digest {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }

    /// Score of complete canonical message bytes (nonce as trailing 8 bytes).
    pub fn score_message_bytes(bytes: &[u8]) -> MessageResult<u32> {
        let split = bytes
            .len()
            .checked_sub(8)
            .ok_or_else(|| MessageError::Deserialization("message shorter than its nonce".into()))?;
        let (prefix, nonce) = bytes.split_at(split);
        let mut nonce_le = [0u8; 8];
        nonce_le.copy_from_slice(nonce);
        let digest = Self::digest(&Self::prefix_hash(prefix), u64::from_le_bytes(nonce_le));
        Ok(Self::score(&digest))
    }

    /// Find a nonce at or after `start` (wrapping) whose score meets
    /// `config.difficulty`.
    ///
    /// Chunks of nonces are handed to rayon workers; the first hit wins and
    /// stops the rest. Fails with `ProofOfWorkTimeout` when the attempt or
    /// time budget runs out.
    pub fn search(bytes_without_nonce: &[u8], start: u64, config: &PowConfig) -> MessageResult<u64> {
        if config.difficulty > MAX_DIFFICULTY {
            return Err(MessageError::InvalidDifficulty(config.difficulty));
        }
        let prefix = Self::prefix_hash(bytes_without_nonce);
        if config.difficulty == 0 {
            return Ok(start);
        }

        let deadline = Instant::now() + config.timeout;
        let attempts = AtomicU64::new(0);
        let chunks = config.max_attempts.div_ceil(CHUNK_SIZE);
        debug!(
            difficulty = config.difficulty,
            start,
            max_attempts = config.max_attempts,
            "starting proof-of-work search"
        );

        let run = || {
            (0..chunks).into_par_iter().find_map_any(|chunk| {
                // Expiry short-circuits the remaining chunks.
                if Instant::now() >= deadline {
                    return Some(Halt::Expired);
                }
                let first = chunk * CHUNK_SIZE;
                let last = (first + CHUNK_SIZE).min(config.max_attempts);
                for offset in first..last {
                    let nonce = start.wrapping_add(offset);
                    let digest = Self::digest(&prefix, nonce);
                    if Self::score(&digest) >= config.difficulty {
                        attempts.fetch_add(offset - first + 1, Ordering::Relaxed);
                        return Some(Halt::Found(nonce));
                    }
                }
                attempts.fetch_add(last - first, Ordering::Relaxed);
                None
            })
        };

        let found = if config.workers == 0 {
            run()
        } else {
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .build()
                .map_err(|e| MessageError::WorkerPool(e.to_string()))?
                .install(run)
        };

        let attempts = attempts.load(Ordering::Relaxed);
        match found {
            Some(Halt::Found(nonce)) => {
                debug!(nonce, attempts, "proof of work found");
                Ok(nonce)
            }
            Some(Halt::Expired) => {
                debug!(attempts, "proof-of-work deadline passed");
                Err(MessageError::ProofOfWorkTimeout { attempts })
            }
            None => Err(MessageError::ProofOfWorkTimeout { attempts }),
        }
    }
}

impl PowConfig {
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}
