use serde::{Deserialize, Serialize};

use crate::db_types::Booking;

/// What a settlement attempt did. Returned by
/// [`ReservationDatabase::settle_payment`](crate::traits::ReservationDatabase::settle_payment),
/// whose compare-and-swap pair guarantees that for any one payment, exactly one concurrent caller
/// ever sees `Confirmed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfirmationOutcome {
    /// This call won the race: the payment is now `Completed` and the hold is `Confirmed`.
    Confirmed(Booking),
    /// The payment was already in a terminal state, so nothing changed. Carries the current
    /// booking so losers can report state without a second query.
    AlreadyFinalized(Booking),
    /// The payment settled, but the hold had already been released (usually swept). The money is
    /// recorded as collected; the booking stays as it was. Needs operator follow-up.
    HoldLapsed(Booking),
}

impl ConfirmationOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            ConfirmationOutcome::Confirmed(b) |
            ConfirmationOutcome::AlreadyFinalized(b) |
            ConfirmationOutcome::HoldLapsed(b) => b,
        }
    }

    /// True only for the caller that actually performed the transition.
    pub fn was_effective(&self) -> bool {
        matches!(self, ConfirmationOutcome::Confirmed(_))
    }
}
