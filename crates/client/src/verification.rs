//! OTP attempt tracking for the verification step.

/// Consecutive rejected codes after which the console offers a resend.
pub const RESEND_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VerificationAttempts {
    failures: u32,
}

impl VerificationAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn should_offer_resend(&self) -> bool {
        self.failures >= RESEND_AFTER_FAILURES
    }
}
