use std::time::Duration;

use crate::scenario::Backoff;

/// Delay before the attempt following `attempt` (1-based).
pub(super) fn delay_after(
    backoff: Backoff,
    attempt: u32,
    base: Duration,
    max: Duration,
) -> Duration {
    let factor = match backoff {
        Backoff::Linear => attempt,
        Backoff::Exponential => 2_u32.saturating_pow(attempt.saturating_sub(1)),
    };
    base.saturating_mul(factor).min(max)
}
