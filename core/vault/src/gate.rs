//! PIN gate in front of vault operations.
//!
//! The gate's PIN doubles as the vault password: a successful unlock yields a
//! [`Credential`] that is handed to the engine unchanged.

use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use hexcore_common::{Error, Result, SensitiveBytes};

/// Environment variable holding the administrator PIN.
pub const ENV_ADMIN_PIN: &str = "HEX_ADMIN_PIN";

/// PIN used when no override is configured.
pub const DEFAULT_PIN: &str = "1234";

/// Required PIN length.
pub const PIN_LENGTH: usize = 4;

/// Unlocked password, zeroized on drop.
#[derive(Debug, Clone)]
pub struct Credential(SensitiveBytes);

impl Credential {
    /// Password bytes handed to the engine.
    pub fn password(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Holds the expected PIN and checks attempts against it.
#[derive(Debug)]
pub struct AccessGate {
    pin: SensitiveBytes,
}

impl AccessGate {
    /// Create a gate for `pin`.
    ///
    /// # Errors
    /// - `InvalidInput` unless `pin` is exactly four ASCII digits
    pub fn new(pin: impl Into<String>) -> Result<Self> {
        let pin = SensitiveBytes::from(pin.into());
        if !is_valid_pin(pin.as_bytes()) {
            return Err(Error::InvalidInput(format!(
                "PIN must be exactly {} digits",
                PIN_LENGTH
            )));
        }
        Ok(Self { pin })
    }

    /// Gate configured from `HEX_ADMIN_PIN`, falling back to the default PIN.
    pub fn from_env() -> Result<Self> {
        match std::env::var(ENV_ADMIN_PIN) {
            Ok(pin) if !pin.is_empty() => Self::new(pin),
            _ => Self::new(DEFAULT_PIN),
        }
    }

    /// Check `attempt` in constant time.
    ///
    /// # Errors
    /// - `AccessDenied` if the attempt does not match
    pub fn unlock(&self, attempt: &str) -> Result<Credential> {
        if bool::from(self.pin.as_bytes().ct_eq(attempt.as_bytes())) {
            debug!("Access granted");
            Ok(Credential(self.pin.clone()))
        } else {
            warn!("Access denied");
            Err(Error::AccessDenied)
        }
    }
}

fn is_valid_pin(pin: &[u8]) -> bool {
    pin.len() == PIN_LENGTH && pin.iter().all(u8::is_ascii_digit)
}
