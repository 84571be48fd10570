use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;
use time::{Duration, OffsetDateTime};
use tracing::debug;

/// One-time reset codes keyed by email. The shipped implementation is
/// process-local memory; a distributed store can replace it behind this trait
/// without touching the auth handlers.
#[async_trait]
pub trait ResetCodeStore: Send + Sync {
    /// Generate and store a fresh code for `email`, replacing any pending one.
    async fn issue(&self, email: &str) -> String;

    /// Check `candidate` against the pending code for `email`.
    ///
    /// A correct code is consumed (single use). A wrong guess leaves the
    /// pending code in place; only expiry or a re-issue invalidates it.
    async fn verify(&self, email: &str, candidate: &str) -> bool;
}

struct PendingCode {
    code: String,
    issued_at: OffsetDateTime,
}

/// In-memory registry. Entries expire lazily: an expired code is treated as
/// absent on the next `verify` and removed then. Nothing survives a restart.
pub struct InMemoryResetCodes {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingCode>>,
}

impl InMemoryResetCodes {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Codes are drawn uniformly from 000000..=999999 and zero-padded, so
    /// every code renders as exactly six digits.
    fn generate_code() -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
    }

    fn issue_at(&self, email: &str, now: OffsetDateTime) -> String {
        let code = Self::generate_code();
        let mut entries = self.entries.lock().expect("reset code map lock");
        entries.insert(
            email.to_string(),
            PendingCode {
                code: code.clone(),
                issued_at: now,
            },
        );
        debug!(email = %email, "reset code issued");
        code
    }

    fn verify_at(&self, email: &str, candidate: &str, now: OffsetDateTime) -> bool {
        let mut entries = self.entries.lock().expect("reset code map lock");
        let Some(entry) = entries.get(email) else {
            return false;
        };
        if now - entry.issued_at > self.ttl {
            entries.remove(email);
            debug!(email = %email, "reset code expired");
            return false;
        }
        if entry.code != candidate {
            return false;
        }
        entries.remove(email);
        debug!(email = %email, "reset code consumed");
        true
    }
}

#[async_trait]
impl ResetCodeStore for InMemoryResetCodes {
    async fn issue(&self, email: &str) -> String {
        self.issue_at(email, OffsetDateTime::now_utc())
    }

    async fn verify(&self, email: &str, candidate: &str) -> bool {
        self.verify_at(email, candidate, OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InMemoryResetCodes {
        InMemoryResetCodes::new(Duration::minutes(10))
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = InMemoryResetCodes::generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn correct_code_verifies_once() {
        let reg = registry();
        let now = OffsetDateTime::now_utc();
        let code = reg.issue_at("a@x.com", now);
        assert!(reg.verify_at("a@x.com", &code, now));
        // consumed on success
        assert!(!reg.verify_at("a@x.com", &code, now));
    }

    #[test]
    fn absent_email_never_verifies() {
        let reg = registry();
        assert!(!reg.verify_at("nobody@x.com", "123456", OffsetDateTime::now_utc()));
    }

    #[test]
    fn wrong_guess_keeps_code_pending() {
        let reg = registry();
        let now = OffsetDateTime::now_utc();
        let code = reg.issue_at("a@x.com", now);
        let wrong = if code == "000000" { "000001" } else { "000000" };
        assert!(!reg.verify_at("a@x.com", wrong, now));
        // the real code still works after a failed guess
        assert!(reg.verify_at("a@x.com", &code, now));
    }

    #[test]
    fn code_expires_after_ttl() {
        let reg = registry();
        let issued = OffsetDateTime::now_utc();
        let code = reg.issue_at("a@x.com", issued);
        let late = issued + Duration::minutes(11);
        assert!(!reg.verify_at("a@x.com", &code, late));
        // expired entry is gone, not just rejected
        assert!(!reg.verify_at("a@x.com", &code, issued));
    }

    #[test]
    fn verify_just_inside_ttl_succeeds() {
        let reg = registry();
        let issued = OffsetDateTime::now_utc();
        let code = reg.issue_at("a@x.com", issued);
        assert!(reg.verify_at("a@x.com", &code, issued + Duration::minutes(10)));
    }

    #[test]
    fn reissue_invalidates_previous_code() {
        let reg = registry();
        let now = OffsetDateTime::now_utc();
        let first = reg.issue_at("a@x.com", now);
        let second = reg.issue_at("a@x.com", now);
        if first != second {
            assert!(!reg.verify_at("a@x.com", &first, now));
        }
        assert!(reg.verify_at("a@x.com", &second, now));
    }

    #[test]
    fn entries_are_keyed_per_email() {
        let reg = registry();
        let now = OffsetDateTime::now_utc();
        let a = reg.issue_at("a@x.com", now);
        let b = reg.issue_at("b@x.com", now);
        assert!(reg.verify_at("a@x.com", &a, now));
        assert!(reg.verify_at("b@x.com", &b, now));
    }
}
