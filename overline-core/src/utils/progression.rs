//! Battle-pass XP awarded when a match settles.

use crate::entities::matches::MatchUserStatus;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

const BASE_XP: i32 = 50;
const XP_PER_PARLAY: i32 = 10;
/// One bonus XP per 10 units staked.
const STAKE_DIVISOR: Decimal = Decimal::from_parts(10, 0, 0, false, 0);
const MIN_XP: i32 = 25;

fn outcome_multiplier(status: MatchUserStatus) -> f64 {
    match status {
        MatchUserStatus::Win => 1.5,
        MatchUserStatus::Draw => 1.2,
        MatchUserStatus::Loss => 1.0,
        MatchUserStatus::Disqualified => 0.5,
        MatchUserStatus::NotResolved => 1.0,
    }
}

/// XP one user earns from a settled match: base + parlay-count bonus +
/// staking bonus, scaled by the outcome, never below the floor.
pub fn xp_award(parlay_count: usize, total_staked: Decimal, status: MatchUserStatus) -> i32 {
    let staking_bonus = (total_staked / STAKE_DIVISOR)
        .trunc()
        .to_i32()
        .unwrap_or(0);
    let raw = BASE_XP + XP_PER_PARLAY * parlay_count as i32 + staking_bonus;
    let scaled = (raw as f64 * outcome_multiplier(status)) as i32;
    scaled.max(MIN_XP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_scales_base_and_bonuses() {
        // 50 + 3*10 + 100/10 = 90, ×1.5 = 135
        assert_eq!(
            xp_award(3, Decimal::from(100), MatchUserStatus::Win),
            135
        );
    }

    #[test]
    fn disqualified_half_rate() {
        // 50 + 20 + 5 = 75, ×0.5 = 37
        assert_eq!(
            xp_award(2, Decimal::from(50), MatchUserStatus::Disqualified),
            37
        );
    }

    #[test]
    fn floor_applies_to_empty_disqualified_seat() {
        // 50 ×0.5 = 25, already at the floor
        assert_eq!(
            xp_award(0, Decimal::ZERO, MatchUserStatus::Disqualified),
            25
        );
    }

    #[test]
    fn loss_keeps_raw_total() {
        assert_eq!(xp_award(2, Decimal::from(80), MatchUserStatus::Loss), 78);
    }
}
