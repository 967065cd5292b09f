//! MatchSettlementEngine processor.
//!
//! The MatchSettlementEngine is responsible for:
//! - Receiving `parlay_resolved {parlayId}` events, and `match_check`
//!   triggers from the poller
//! - Locking the match row and bailing out if it already settled
//! - Verifying every parlay of both seats is resolved and no open prop
//!   remains for the league on a game that has yet to start
//! - Applying the disqualification rule, deciding the outcome, updating
//!   ELO ratings for competitive matches, and awarding battle-pass XP
//! - Marking the match resolved and emitting the cache-invalidation fan-out

use crate::entities::battle_pass::BattlePassProgress;
use crate::entities::matches::{Match, MatchType, MatchUser, MatchUserStatus};
use crate::entities::parlay::{Parlay, ParlayOutcome};
use crate::entities::prop::Prop;
use crate::entities::user::User;
use crate::events::{
    BusMessage, EventPublisher, EventSubscriber, InvalidateQueries, MatchCheck, Notification,
    ParlayResolved,
};
use crate::utils::progression::xp_award;
use crate::utils::rating::{EloOutcome, clamp_to_floor, recalculate};
use kanau::processor::Processor;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// A seat must place at least this many parlays to stay qualified.
const MIN_PARLAYS_REQUIRED: usize = 2;

/// ... and stake at least this fraction of its starting balance.
const MIN_PCT_TOTAL_STAKED: Decimal = Decimal::from_parts(6, 0, 0, false, 1);

/// Errors that can occur while settling matches.
#[derive(Debug, Error)]
pub enum MatchSettleError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// What one seat did over the life of the match.
#[derive(Debug, Clone, PartialEq)]
struct SeatSummary {
    parlay_count: usize,
    total_staked: Decimal,
    starting_balance: Decimal,
    balance: Decimal,
}

impl SeatSummary {
    fn new(seat: &MatchUser, parlays: &[ParlayOutcome]) -> Self {
        Self {
            parlay_count: parlays.len(),
            total_staked: parlays.iter().map(|p| p.stake).sum(),
            starting_balance: seat.starting_balance,
            balance: seat.balance,
        }
    }

    fn is_disqualified(&self) -> bool {
        self.parlay_count < MIN_PARLAYS_REQUIRED
            || self.total_staked < (self.starting_balance * MIN_PCT_TOTAL_STAKED).round()
    }
}

/// Outcome resolution: disqualification first, then balance comparison.
/// The ELO outcome is `None` only when both seats are disqualified.
fn decide_outcome(
    a: &SeatSummary,
    b: &SeatSummary,
) -> (MatchUserStatus, MatchUserStatus, Option<EloOutcome>) {
    match (a.is_disqualified(), b.is_disqualified()) {
        (true, true) => (
            MatchUserStatus::Disqualified,
            MatchUserStatus::Disqualified,
            None,
        ),
        (true, false) => (
            MatchUserStatus::Disqualified,
            MatchUserStatus::Win,
            Some(EloOutcome::SecondWins),
        ),
        (false, true) => (
            MatchUserStatus::Win,
            MatchUserStatus::Disqualified,
            Some(EloOutcome::FirstWins),
        ),
        (false, false) => {
            if a.balance > b.balance {
                (
                    MatchUserStatus::Win,
                    MatchUserStatus::Loss,
                    Some(EloOutcome::FirstWins),
                )
            } else if a.balance < b.balance {
                (
                    MatchUserStatus::Loss,
                    MatchUserStatus::Win,
                    Some(EloOutcome::SecondWins),
                )
            } else {
                (
                    MatchUserStatus::Draw,
                    MatchUserStatus::Draw,
                    Some(EloOutcome::Draw),
                )
            }
        }
    }
}

/// MatchSettlementEngine closes matches once everything they depend on has
/// settled.
pub struct MatchSettlementEngine {
    pool: PgPool,
    publisher: EventPublisher,
}

impl MatchSettlementEngine {
    pub fn new(pool: PgPool, publisher: EventPublisher) -> Self {
        Self { pool, publisher }
    }

    /// Run the MatchSettlementEngine until shutdown is signaled.
    pub async fn run(self, mut subscriber: EventSubscriber, mut shutdown_rx: watch::Receiver<bool>) {
        info!("MatchSettlementEngine started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("MatchSettlementEngine received shutdown signal");
                        break;
                    }
                }

                notice = subscriber.recv() => {
                    let result = match notice.channel.as_str() {
                        ParlayResolved::CHANNEL => match notice.decode::<ParlayResolved>() {
                            Ok(event) => self.process(event).await,
                            Err(e) => {
                                error!(error = %e, "Received malformed parlay_resolved message");
                                continue;
                            }
                        },
                        MatchCheck::CHANNEL => match notice.decode::<MatchCheck>() {
                            Ok(event) => self.process(event).await,
                            Err(e) => {
                                error!(error = %e, "Received malformed match_check message");
                                continue;
                            }
                        },
                        other => {
                            warn!(channel = other, "Notification on unexpected channel");
                            continue;
                        }
                    };

                    if let Err(e) = result {
                        error!(error = %e, "Failed to settle match");
                    }
                }
            }
        }

        info!("MatchSettlementEngine shutdown complete");
    }

    /// Try to close one match inside the given transaction.
    async fn settle_match(
        &self,
        mut tx: Transaction<'_, Postgres>,
        match_id: i64,
    ) -> Result<(), MatchSettleError> {
        // Lock first, check second: concurrent deliveries targeting the
        // same match serialize here and the losers see `resolved`.
        let Some(m) = Match::lock_tx(&mut tx, match_id).await? else {
            warn!(match_id, "No match found");
            tx.rollback().await?;
            return Ok(());
        };
        if m.resolved {
            tx.commit().await?;
            debug!(match_id, "Match already resolved");
            return Ok(());
        }

        let seats = MatchUser::for_match_tx(&mut tx, match_id).await?;
        if seats.len() != 2 {
            error!(
                match_id,
                seats = seats.len(),
                "Match does not have exactly 2 users, skipping settlement"
            );
            tx.rollback().await?;
            return Ok(());
        }

        let parlays_a = Parlay::for_match_user_tx(&mut tx, seats[0].id).await?;
        let parlays_b = Parlay::for_match_user_tx(&mut tx, seats[1].id).await?;
        if parlays_a.iter().chain(&parlays_b).any(|p| !p.resolved) {
            tx.commit().await?;
            debug!(match_id, "Match not ready, unresolved parlays remain");
            return Ok(());
        }

        let open_props = Prop::count_open_for_league_tx(&mut tx, m.league).await?;
        if open_props > 0 {
            tx.commit().await?;
            debug!(match_id, open_props, "Match not ready, props still open");
            return Ok(());
        }

        let summary_a = SeatSummary::new(&seats[0], &parlays_a);
        let summary_b = SeatSummary::new(&seats[1], &parlays_b);
        let (status_a, status_b, elo_outcome) = decide_outcome(&summary_a, &summary_b);

        MatchUser::set_status_tx(&mut tx, seats[0].id, status_a).await?;
        MatchUser::set_status_tx(&mut tx, seats[1].id, status_b).await?;

        if m.match_type == MatchType::Competitive {
            if let Some(outcome) = elo_outcome {
                apply_rating(&mut tx, &seats[0], &seats[1], outcome).await?;
            }
        }

        award_progression(&mut tx, &seats[0], &summary_a, status_a).await?;
        award_progression(&mut tx, &seats[1], &summary_b, status_b).await?;

        Match::mark_resolved_tx(&mut tx, match_id).await?;
        tx.commit().await?;

        info!(
            match_id,
            status_a = ?status_a,
            status_b = ?status_b,
            "Match resolved"
        );

        self.publish_resolution_effects(match_id, &seats).await;
        Ok(())
    }

    /// Post-commit cache-invalidation fan-out plus a notification to both
    /// participants.
    async fn publish_resolution_effects(&self, match_id: i64, seats: &[MatchUser]) {
        let (user_a, user_b) = (seats[0].user_id, seats[1].user_id);

        self.publisher
            .publish(&InvalidateQueries {
                keys: vec![
                    json!(["match", match_id]),
                    json!(["match-ids", user_a, "resolved"]),
                    json!(["match-ids", user_b, "resolved"]),
                    json!(["match-ids", user_a, "unresolved"]),
                    json!(["match-ids", user_b, "unresolved"]),
                    json!(["user", user_a]),
                    json!(["user", user_b]),
                    json!(["user", user_a, "rank"]),
                    json!(["user", user_b, "rank"]),
                    json!(["career", user_a]),
                    json!(["career", user_b]),
                ],
            })
            .await;

        self.publisher
            .publish(&Notification {
                receiver_ids: vec![user_a, user_b],
                event: "match-resolved".to_string(),
                data: json!({"matchId": match_id}),
            })
            .await;
    }
}

/// ELO update for a competitive match: persist per-seat deltas and the
/// clamped new ratings.
async fn apply_rating(
    tx: &mut Transaction<'_, Postgres>,
    seat_a: &MatchUser,
    seat_b: &MatchUser,
    outcome: EloOutcome,
) -> Result<(), MatchSettleError> {
    let points_a = User::get_points_tx(tx, seat_a.user_id).await?;
    let points_b = User::get_points_tx(tx, seat_b.user_id).await?;
    let (Some(r_a), Some(r_b)) = (points_a, points_b) else {
        error!(
            match_id = seat_a.match_id,
            "Rating rows missing for match users, skipping ELO update"
        );
        return Ok(());
    };

    let (new_a, new_b) = recalculate(r_a, r_b, outcome);

    MatchUser::set_points_delta_tx(tx, seat_a.id, (new_a - r_a).max(0.0)).await?;
    MatchUser::set_points_delta_tx(tx, seat_b.id, (new_b - r_b).max(0.0)).await?;

    User::set_points_tx(tx, seat_a.user_id, clamp_to_floor(new_a)).await?;
    User::set_points_tx(tx, seat_b.user_id, clamp_to_floor(new_b)).await?;

    debug!(
        match_id = seat_a.match_id,
        rating_a = new_a,
        rating_b = new_b,
        "Applied rating update"
    );
    Ok(())
}

/// Battle-pass XP for one seat, applied to every currently active pass.
async fn award_progression(
    tx: &mut Transaction<'_, Postgres>,
    seat: &MatchUser,
    summary: &SeatSummary,
    status: MatchUserStatus,
) -> Result<(), MatchSettleError> {
    let passes = BattlePassProgress::active_for_user_tx(tx, seat.user_id).await?;
    if passes.is_empty() {
        return Ok(());
    }

    let xp = xp_award(summary.parlay_count, summary.total_staked, status);
    for pass in &passes {
        BattlePassProgress::add_xp_tx(tx, pass.id, xp).await?;
    }

    debug!(
        user_id = %seat.user_id,
        xp,
        passes = passes.len(),
        "Awarded battle pass XP"
    );
    Ok(())
}

impl Processor<ParlayResolved> for MatchSettlementEngine {
    type Output = ();
    type Error = MatchSettleError;

    async fn process(&self, event: ParlayResolved) -> Result<(), MatchSettleError> {
        let mut tx = self.pool.begin().await?;

        let Some(match_id) = Match::id_by_parlay_tx(&mut tx, event.parlay_id).await? else {
            // Dynasty-league parlays have no match to settle.
            debug!(parlay_id = event.parlay_id, "No match for parlay");
            tx.rollback().await?;
            return Ok(());
        };

        debug!(
            parlay_id = event.parlay_id,
            match_id, "Checking match for settlement"
        );
        self.settle_match(tx, match_id).await
    }
}

impl Processor<MatchCheck> for MatchSettlementEngine {
    type Output = ();
    type Error = MatchSettleError;

    async fn process(&self, event: MatchCheck) -> Result<(), MatchSettleError> {
        debug!(
            match_id = event.match_id,
            triggered_by = %event.triggered_by,
            "Re-checking match"
        );
        let tx = self.pool.begin().await?;
        self.settle_match(tx, event.match_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seat(parlay_count: usize, staked: i64, starting: i64, balance: i64) -> SeatSummary {
        SeatSummary {
            parlay_count,
            total_staked: Decimal::from(staked),
            starting_balance: Decimal::from(starting),
            balance: Decimal::from(balance),
        }
    }

    #[test]
    fn too_few_parlays_disqualifies_regardless_of_balance() {
        let a = seat(1, 900, 1000, 5000);
        let b = seat(3, 700, 1000, 10);
        let (status_a, status_b, outcome) = decide_outcome(&a, &b);
        assert_eq!(status_a, MatchUserStatus::Disqualified);
        assert_eq!(status_b, MatchUserStatus::Win);
        assert_eq!(outcome, Some(EloOutcome::SecondWins));
    }

    #[test]
    fn understaking_disqualifies() {
        // min staked = round(1000 × 0.6) = 600
        let a = seat(2, 599, 1000, 1200);
        let b = seat(2, 600, 1000, 900);
        let (status_a, status_b, _) = decide_outcome(&a, &b);
        assert_eq!(status_a, MatchUserStatus::Disqualified);
        assert_eq!(status_b, MatchUserStatus::Win);
    }

    #[test]
    fn both_disqualified_means_no_winner() {
        let a = seat(0, 0, 1000, 1000);
        let b = seat(1, 100, 1000, 1400);
        let (status_a, status_b, outcome) = decide_outcome(&a, &b);
        assert_eq!(status_a, MatchUserStatus::Disqualified);
        assert_eq!(status_b, MatchUserStatus::Disqualified);
        assert_eq!(outcome, None);
    }

    #[test]
    fn higher_balance_wins_when_both_qualified() {
        let a = seat(2, 800, 1000, 1450);
        let b = seat(2, 800, 1000, 1449);
        let (status_a, status_b, outcome) = decide_outcome(&a, &b);
        assert_eq!(status_a, MatchUserStatus::Win);
        assert_eq!(status_b, MatchUserStatus::Loss);
        assert_eq!(outcome, Some(EloOutcome::FirstWins));
    }

    #[test]
    fn equal_balances_draw() {
        let a = seat(2, 800, 1000, 1200);
        let b = seat(3, 900, 1000, 1200);
        let (status_a, status_b, outcome) = decide_outcome(&a, &b);
        assert_eq!(status_a, MatchUserStatus::Draw);
        assert_eq!(status_b, MatchUserStatus::Draw);
        assert_eq!(outcome, Some(EloOutcome::Draw));
    }
}
