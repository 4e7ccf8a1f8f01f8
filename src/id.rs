//! Reference identifiers tying the signed Body to its signature `Reference`.
//!
//! Identifiers have the shape `<prefix>-<32 lowercase hex characters>` and are
//! drawn from a [`RandomSource`]. There is no counter or shared state, so a
//! single [`IdGenerator`] can be used from any number of tasks at once.

use std::fmt;
use std::sync::Arc;

use rand::{TryRngCore, rngs::OsRng};
use thiserror::Error;
use tracing::warn;

/// Random bytes behind every identifier.
const ID_BYTES: usize = 16;

/// Reads attempted against the random source before giving up.
const MAX_ATTEMPTS: usize = 5;

/// Failure reported by a [`RandomSource`].
#[derive(Debug, Clone, Default, Error)]
#[error("{0}")]
pub struct RandomError(pub String);

#[derive(Debug, Error)]
pub enum IdError {
    #[error("random source failed {attempts} consecutive times: {last}")]
    Exhausted { attempts: usize, last: RandomError },
}

/// A source of cryptographically strong random bytes.
pub trait RandomSource: Send + Sync {
    /// Fill `buf` completely or fail.
    fn try_fill(&self, buf: &mut [u8]) -> Result<(), RandomError>;
}

/// The operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn try_fill(&self, buf: &mut [u8]) -> Result<(), RandomError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| RandomError(e.to_string()))
    }
}

/// Generates unique, non-predictable reference identifiers.
#[derive(Clone)]
pub struct IdGenerator {
    source: Arc<dyn RandomSource>,
}

impl IdGenerator {
    pub fn new(source: impl RandomSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Returns `<prefix>-<32 hex characters>`.
    ///
    /// A failing random source is retried a few times; once the budget is
    /// spent the error is returned instead of a weaker identifier.
    pub fn generate(&self, prefix: &str) -> Result<String, IdError> {
        let mut buf = [0u8; ID_BYTES];
        let mut last = RandomError::default();

        for attempt in 1..=MAX_ATTEMPTS {
            match self.source.try_fill(&mut buf) {
                Ok(()) => return Ok(format!("{prefix}-{}", hex::encode(buf))),
                Err(e) => {
                    warn!(attempt, error = %e, "Random source failed while generating an ID");
                    last = e;
                }
            }
        }

        Err(IdError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last,
        })
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(OsRandom)
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator").finish_non_exhaustive()
    }
}

/// Checks that `id` reads `<prefix>-<32 lowercase hex characters>`.
pub fn is_well_formed(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|hex| {
            hex.len() == ID_BYTES * 2
                && hex
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
}
