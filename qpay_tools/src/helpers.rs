use rand::{distributions::Alphanumeric, Rng};

/// Generates a fresh order code for a payment attempt: 12 random alphanumeric characters.
///
/// Order codes are unique per attempt and opaque. The booking they belong to is stored against the
/// payment record, never encoded into (or parsed out of) the code itself.
pub fn new_order_code() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(12).map(char::from).collect()
}
