//! Property-based tests for confirmation codes and the login state machine.

use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use token_service::confirm::{ConfirmCode, ConfirmationIssuer};
use token_service::session::{ConfirmOutcome, LoginState};

fn issuer() -> ConfirmationIssuer {
    ConfirmationIssuer::new(4, Duration::from_secs(300), 5)
}

proptest! {
    /// A pending login is confirmed iff the supplied string equals the stored one.
    #[test]
    fn confirmed_iff_identical(stored in "[0-9]{4,9}", supplied in "[0-9]{0,10}") {
        let mut login = LoginState::pending("alice", ConfirmCode::from(stored.as_str()), Utc::now());
        let outcome = login.confirm(&supplied, &issuer(), Utc::now());

        if stored == supplied {
            prop_assert_eq!(outcome, ConfirmOutcome::Confirmed);
            prop_assert!(login.is_authenticated());
        } else {
            prop_assert!(matches!(outcome, ConfirmOutcome::Mismatch { .. }), "numeric equality must not confirm");
            prop_assert_eq!(login.user(), Some("alice"));
        }
    }

    /// Leading zeros are significant.
    #[test]
    fn leading_zeros_matter(n in 0u32..1000) {
        let padded = format!("{n:04}");
        let code = ConfirmCode::from(padded.as_str());
        prop_assert!(code.matches(&padded));
        prop_assert!(!code.matches(&n.to_string()));
    }

    /// Issued codes have the configured width and only digits.
    #[test]
    fn issued_code_shape(digits in 4u32..=9) {
        let issuer = ConfirmationIssuer::new(digits, Duration::from_secs(300), 5);
        let code = issuer.issue();
        prop_assert_eq!(code.as_str().len(), digits as usize);
        prop_assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
    }
}
