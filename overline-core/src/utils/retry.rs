//! Retry policy for transient database failures.

/// Retries after the initial attempt before giving up on a game.
pub const MAX_RETRIES: u32 = 3;

/// Backoff before retry `attempt` (0-based): 1s, then ×1.5 per retry.
pub fn retry_delay(attempt: u32) -> std::time::Duration {
    let millis = 1000.0 * 1.5f64.powi(attempt as i32);
    std::time::Duration::from_millis(millis as u64)
}

/// Whether an error is worth retrying at all.
///
/// Pool exhaustion and transport blips clear on their own; everything else
/// (constraint violations, decode errors, missing rows) will not.
pub fn is_transient(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule() {
        assert_eq!(retry_delay(0), std::time::Duration::from_millis(1000));
        assert_eq!(retry_delay(1), std::time::Duration::from_millis(1500));
        assert_eq!(retry_delay(2), std::time::Duration::from_millis(2250));
    }

    #[test]
    fn pool_timeout_is_transient() {
        assert!(is_transient(&sqlx::Error::PoolTimedOut));
        assert!(!is_transient(&sqlx::Error::RowNotFound));
    }
}
