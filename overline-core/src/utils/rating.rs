//! ELO rating math for competitive matches.

/// Rating volatility constant.
pub const K: f64 = 32.0;

/// Ratings never drop below the platform floor.
pub const RATING_FLOOR: f64 = 1000.0;

/// Decided outcome between the first and second rated player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EloOutcome {
    FirstWins,
    SecondWins,
    Draw,
}

/// Standard Arpad Elo update: `E_A = 1/(1+10^((R_B−R_A)/400))`,
/// `R'_A = R_A + K×(S_A−E_A)`. Returns both new ratings, rounded.
pub fn recalculate(r_a: f64, r_b: f64, outcome: EloOutcome) -> (f64, f64) {
    let (s_a, s_b) = match outcome {
        EloOutcome::FirstWins => (1.0, 0.0),
        EloOutcome::SecondWins => (0.0, 1.0),
        EloOutcome::Draw => (0.5, 0.5),
    };

    let e_a = 1.0 / (1.0 + 10f64.powf((r_b - r_a) / 400.0));
    let e_b = 1.0 - e_a;

    let r_prime_a = r_a + K * (s_a - e_a);
    let r_prime_b = r_b + K * (s_b - e_b);

    (r_prime_a.round(), r_prime_b.round())
}

/// Clamp a rating to the platform floor.
pub fn clamp_to_floor(rating: f64) -> f64 {
    rating.max(RATING_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_decisive_win_moves_sixteen_points() {
        let (a, b) = recalculate(1500.0, 1500.0, EloOutcome::FirstWins);
        assert_eq!(a, 1516.0);
        assert_eq!(b, 1484.0);
    }

    #[test]
    fn deltas_are_symmetric_for_decisive_results() {
        let (a, b) = recalculate(1432.0, 1581.0, EloOutcome::SecondWins);
        assert_eq!(a - 1432.0, -(b - 1581.0));
    }

    #[test]
    fn underdog_win_transfers_more_points() {
        let (a, b) = recalculate(1400.0, 1600.0, EloOutcome::FirstWins);
        assert_eq!(a, 1424.0);
        assert_eq!(b, 1576.0);
    }

    #[test]
    fn draw_moves_nothing_at_equal_ratings() {
        let (a, b) = recalculate(1500.0, 1500.0, EloOutcome::Draw);
        assert_eq!(a, 1500.0);
        assert_eq!(b, 1500.0);
    }

    #[test]
    fn floor_clamps_low_ratings() {
        assert_eq!(clamp_to_floor(987.0), RATING_FLOOR);
        assert_eq!(clamp_to_floor(1204.0), 1204.0);
    }
}
