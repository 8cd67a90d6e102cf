use crate::error::*;
use rand::RngCore;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Number of random bytes in a generated nonce, before base64 encoding.
pub const NONCE_BYTES: usize = 8;

/// A source of the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> SystemTime;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<SystemTime>);

impl ManualClock {
    pub fn new(now: SystemTime) -> Self {
        ManualClock(Mutex::new(now))
    }

    pub fn set(&self, now: SystemTime) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A source of Hawk nonces.
pub trait NonceSource: Send + Sync + 'static {
    fn nonce(&self) -> Result<String>;
}

/// Random nonces: `NONCE_BYTES` bytes of entropy, base64-encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNonce;

impl NonceSource for RandomNonce {
    fn nonce(&self) -> Result<String> {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::thread_rng().try_fill_bytes(&mut bytes)?;
        Ok(base64::encode(&bytes))
    }
}

/// Always the same nonce.  Only useful for producing known-good MACs in tests.
#[derive(Debug, Clone)]
pub struct FixedNonce(pub String);

impl NonceSource for FixedNonce {
    fn nonce(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Context for Hawk client authentication.  This contains the information that does not change
/// from request to request: where timestamps and nonces come from, and how far the local clock
/// is known to be off from the server's.
///
/// Most users will create a single Context for all Hawk requests.
#[derive(Clone)]
pub struct Context {
    clock: Arc<dyn Clock>,
    nonces: Arc<dyn NonceSource>,
    /// Local clock offset relative to the server, in milliseconds, added to every timestamp.
    localtime_offset_ms: i64,
}

impl Context {
    pub fn new(clock: Arc<dyn Clock>, nonces: Arc<dyn NonceSource>) -> Self {
        Context {
            clock,
            nonces,
            localtime_offset_ms: 0,
        }
    }

    pub fn with_localtime_offset(mut self, offset_ms: i64) -> Self {
        self.localtime_offset_ms = offset_ms;
        self
    }

    /// The local time, uncorrected.  Token expiry is always judged against this.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// The clock that backs this context.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// The time to put in a Hawk header: local time corrected by the offset.
    pub fn timestamp(&self) -> SystemTime {
        let now = self.clock.now();
        let offset = Duration::from_millis(self.localtime_offset_ms.unsigned_abs());
        if self.localtime_offset_ms >= 0 {
            now.checked_add(offset).unwrap_or(now)
        } else {
            now.checked_sub(offset).unwrap_or(now)
        }
    }

    pub fn nonce(&self) -> Result<String> {
        self.nonces.nonce()
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(Arc::new(SystemClock), Arc::new(RandomNonce))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Context")
            .field("localtime_offset_ms", &self.localtime_offset_ms)
            .finish()
    }
}
