//! ParlaySettlementEngine processor.
//!
//! The ParlaySettlementEngine is responsible for:
//! - Receiving `pick_resolved {id}` events, each handled in its own task
//!   behind a concurrency gate that protects the connection pool
//! - Locking the owning parlay row and bailing out if it already settled —
//!   the primary defense against duplicate delivery
//! - Checking pick completeness, computing the payout, and crediting the
//!   owner's balance as a relative increment, all in one transaction
//! - Emitting `parlay_resolved {parlayId}` plus cache-invalidation and
//!   push-notification side effects after the commit

use crate::entities::matches::MatchUser;
use crate::entities::parlay::{DynastyLeagueUser, Parlay, ParlayOwner, ParlayType};
use crate::entities::pick::{Pick, PickStatus};
use crate::events::{
    EventPublisher, EventSubscriber, InvalidateQueries, Notification, ParlayResolved, PickResolved,
};
use kanau::processor::Processor;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, error, info, warn};

/// Bound on concurrently in-flight handlers; keeps a burst of pick
/// resolutions from exhausting the shared connection pool.
const MAX_CONCURRENT_HANDLERS: usize = 15;

/// Errors that can occur while settling parlays.
#[derive(Debug, Error)]
pub enum ParlaySettleError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Multiplier for a perfect (all-or-nothing) parlay of `effective` picks.
fn perfect_multiplier(effective: usize) -> Decimal {
    match effective {
        2 => Decimal::new(30, 1),
        3 => Decimal::new(50, 1),
        4 => Decimal::new(100, 1),
        5 => Decimal::new(200, 1),
        6 => Decimal::new(375, 1),
        _ => Decimal::ZERO,
    }
}

/// Multiplier for a flex parlay: partial credit from a fixed
/// (effective picks, hits) table. Unlisted pairs pay nothing.
fn flex_multiplier(effective: usize, hits: usize) -> Decimal {
    match (effective, hits) {
        (3, 3) => Decimal::new(225, 2),
        (3, 2) => Decimal::new(125, 2),
        (4, 4) => Decimal::new(50, 1),
        (4, 3) => Decimal::new(15, 1),
        (5, 5) => Decimal::new(100, 1),
        (5, 4) => Decimal::new(20, 1),
        (5, 3) => Decimal::new(4, 1),
        (6, 6) => Decimal::new(250, 1),
        (6, 5) => Decimal::new(20, 1),
        (6, 4) => Decimal::new(4, 1),
        _ => Decimal::ZERO,
    }
}

/// Payout for a fully-resolved parlay. Ties and did-not-plays are excluded
/// from the pick count before the table lookup.
pub fn compute_payout(
    parlay_type: ParlayType,
    stake: Decimal,
    total_picks: usize,
    hit_count: usize,
    ignore_count: usize,
) -> Decimal {
    let effective_count = total_picks - ignore_count;
    match parlay_type {
        ParlayType::Perfect => {
            if effective_count != hit_count {
                Decimal::ZERO
            } else {
                stake * perfect_multiplier(effective_count)
            }
        }
        ParlayType::Flex => {
            if effective_count < 2 {
                Decimal::ZERO
            } else {
                stake * flex_multiplier(effective_count, hit_count)
            }
        }
    }
}

/// ParlaySettlementEngine resolves parlays and credits owner balances.
pub struct ParlaySettlementEngine {
    pool: PgPool,
    publisher: EventPublisher,
    limiter: Arc<Semaphore>,
}

impl ParlaySettlementEngine {
    pub fn new(pool: PgPool, publisher: EventPublisher) -> Self {
        Self {
            pool,
            publisher,
            limiter: Arc::new(Semaphore::new(MAX_CONCURRENT_HANDLERS)),
        }
    }

    /// Run the ParlaySettlementEngine until shutdown is signaled.
    ///
    /// Each message is handled in its own task; handler failures are logged
    /// and never crash the listener loop.
    pub async fn run(
        self: Arc<Self>,
        mut subscriber: EventSubscriber,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("ParlaySettlementEngine started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("ParlaySettlementEngine received shutdown signal");
                        break;
                    }
                }

                notice = subscriber.recv() => {
                    let event: PickResolved = match notice.decode() {
                        Ok(event) => event,
                        Err(e) => {
                            error!(error = %e, "Received malformed pick_resolved message");
                            continue;
                        }
                    };

                    let permit = match Arc::clone(&self.limiter).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            error!("Handler semaphore closed");
                            break;
                        }
                    };

                    let engine = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = engine.process(event).await {
                            error!(
                                pick_id = event.id,
                                error = %e,
                                "Failed to settle parlay"
                            );
                        }
                    });
                }
            }
        }

        info!("ParlaySettlementEngine shutdown complete");
    }

    /// Post-commit fan-out for the owner: cache invalidation plus a push
    /// notification.
    async fn publish_owner_effects(&self, parlay_id: i64, owner: ParlayOwner) {
        match owner {
            ParlayOwner::Match {
                match_id, user_id, ..
            } => {
                self.publisher
                    .publish(&InvalidateQueries {
                        keys: vec![
                            json!(["parlay", parlay_id]),
                            json!(["parlays", "match", match_id, user_id]),
                            json!(["match", match_id]),
                            json!(["match-ids", user_id, "unresolved"]),
                            json!(["career", user_id]),
                        ],
                    })
                    .await;
                self.publisher
                    .publish(&Notification {
                        receiver_ids: vec![user_id],
                        event: "match-parlay-resolved".to_string(),
                        data: json!({"matchId": match_id, "parlayId": parlay_id}),
                    })
                    .await;
            }
            ParlayOwner::DynastyLeague {
                dynasty_league_id,
                user_id,
                ..
            } => {
                self.publisher
                    .publish(&InvalidateQueries {
                        keys: vec![
                            json!(["parlay", parlay_id]),
                            json!(["parlays", "dynasty-league", dynasty_league_id, user_id]),
                            json!(["dynasty-league", dynasty_league_id, "users"]),
                            json!(["career", user_id]),
                        ],
                    })
                    .await;
                self.publisher
                    .publish(&Notification {
                        receiver_ids: vec![user_id],
                        event: "dynasty-league-parlay-resolved".to_string(),
                        data: json!({
                            "dynastyLeagueId": dynasty_league_id,
                            "parlayId": parlay_id,
                        }),
                    })
                    .await;
            }
        }
    }
}

impl Processor<PickResolved> for ParlaySettlementEngine {
    type Output = ();
    type Error = ParlaySettleError;

    async fn process(&self, event: PickResolved) -> Result<(), ParlaySettleError> {
        let mut tx = self.pool.begin().await?;

        let Some(parlay) = Parlay::find_by_pick_tx(&mut tx, event.id).await? else {
            warn!(pick_id = event.id, "No parlay found containing pick");
            tx.rollback().await?;
            return Ok(());
        };

        // Lock before re-checking `resolved`: duplicate deliveries of the
        // same message serialize on this row and see the flag flipped.
        match Parlay::lock_tx(&mut tx, parlay.id).await? {
            Some(true) => {
                tx.commit().await?;
                debug!(parlay_id = parlay.id, "Parlay already resolved");
                return Ok(());
            }
            Some(false) => {}
            None => {
                warn!(parlay_id = parlay.id, "Parlay disappeared before lock");
                tx.rollback().await?;
                return Ok(());
            }
        }

        let statuses = Pick::statuses_for_parlay_tx(&mut tx, parlay.id).await?;
        let mut hit_count = 0usize;
        let mut ignore_count = 0usize;
        for status in &statuses {
            match status {
                PickStatus::NotResolved => {
                    tx.commit().await?;
                    debug!(parlay_id = parlay.id, "Parlay not ready to resolve");
                    return Ok(());
                }
                PickStatus::Hit => hit_count += 1,
                PickStatus::Tie | PickStatus::DidNotPlay => ignore_count += 1,
                PickStatus::Missed => {}
            }
        }

        let payout = compute_payout(
            parlay.parlay_type,
            parlay.stake,
            statuses.len(),
            hit_count,
            ignore_count,
        );

        let Some(owner) = parlay.owner() else {
            error!(parlay_id = parlay.id, "Parlay has no owner reference");
            tx.rollback().await?;
            return Ok(());
        };

        Parlay::mark_resolved_tx(&mut tx, parlay.id, payout).await?;

        let credited = match owner {
            ParlayOwner::Match { match_user_id, .. } => {
                MatchUser::credit_balance_tx(&mut tx, match_user_id, payout).await?
            }
            ParlayOwner::DynastyLeague {
                dynasty_league_user_id,
                ..
            } => DynastyLeagueUser::credit_balance_tx(&mut tx, dynasty_league_user_id, payout).await?,
        };
        if credited == 0 {
            error!(
                parlay_id = parlay.id,
                "Owner row missing, balance not credited"
            );
        }

        tx.commit().await?;
        info!(
            parlay_id = parlay.id,
            pick_id = event.id,
            payout = %payout,
            "Parlay settled"
        );

        self.publisher
            .publish(&ParlayResolved {
                parlay_id: parlay.id,
            })
            .await;
        self.publish_owner_effects(parlay.id, owner).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn perfect_parlay_pays_the_table() {
        // 4 picks all hit: stake ×10
        let payout = compute_payout(ParlayType::Perfect, dec("10"), 4, 4, 0);
        assert_eq!(payout, dec("100"));
    }

    #[test]
    fn perfect_parlay_misses_everything_on_one_miss() {
        let payout = compute_payout(ParlayType::Perfect, dec("10"), 4, 3, 0);
        assert_eq!(payout, Decimal::ZERO);
    }

    #[test]
    fn perfect_parlay_with_undefined_pick_count_pays_nothing() {
        let payout = compute_payout(ParlayType::Perfect, dec("10"), 7, 7, 0);
        assert_eq!(payout, Decimal::ZERO);
    }

    #[test]
    fn flex_parlay_partial_credit() {
        // 5 picks, 4 hits: stake ×2.0
        let payout = compute_payout(ParlayType::Flex, dec("20"), 5, 4, 0);
        assert_eq!(payout, dec("40"));
    }

    #[test]
    fn flex_parlay_unlisted_pair_pays_nothing() {
        let payout = compute_payout(ParlayType::Flex, dec("20"), 5, 2, 0);
        assert_eq!(payout, Decimal::ZERO);
    }

    #[test]
    fn ties_shrink_the_effective_count() {
        // 4 picks, 1 tie, 3 hits: looked up as (3,3), not (4,3)
        let payout = compute_payout(ParlayType::Flex, dec("10"), 4, 3, 1);
        assert_eq!(payout, dec("22.50"));
    }

    #[test]
    fn perfect_parlay_all_ties_reduces_below_table() {
        // 2 picks, both ties: effective 0, hits 0 — equal but unlisted
        let payout = compute_payout(ParlayType::Perfect, dec("10"), 2, 0, 2);
        assert_eq!(payout, Decimal::ZERO);
    }

    #[test]
    fn flex_parlay_shrunk_below_two_effective_pays_nothing() {
        let payout = compute_payout(ParlayType::Flex, dec("10"), 3, 1, 2);
        assert_eq!(payout, Decimal::ZERO);
    }
}
