use std::fmt;

use rand::Rng;

/// Number of digits in a PIN.
pub const PIN_LEN: usize = 4;

/// A four-digit, zero-padded PIN issued with a new card.
///
/// PINs are stored and compared as plain text.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    /// Draw a PIN uniformly from `0000..=9999`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value: u16 = rng.gen_range(0..10_000);
        Self(format!("{:0width$}", value, width = PIN_LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep PINs out of debug output and logs.
impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
