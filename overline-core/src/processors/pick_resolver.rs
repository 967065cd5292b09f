//! PickResolver processor.
//!
//! The PickResolver is responsible for:
//! - Receiving `prop_updated {id}` events
//! - Loading the prop's current value, line, and status
//! - Moving every dependent pick through the status transition table in a
//!   single statement per branch, inside one transaction
//! - Emitting `pick_resolved {id}` and a cache-invalidation notice per
//!   affected pick
//!
//! Parlay readiness is none of this stage's business; the settlement engine
//! re-derives completeness on its own.

use crate::entities::pick::{Pick, PickChoice, PickRef, PickStatus};
use crate::entities::prop::{Prop, PropSnapshot, PropStatus};
use crate::events::{EventPublisher, EventSubscriber, InvalidateQueries, PickResolved, PropUpdated};
use kanau::processor::Processor;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use std::cmp::Ordering;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Errors that can occur while resolving picks.
#[derive(Debug, Error)]
pub enum PickResolveError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// PickResolver cascades prop changes onto the picks that reference them.
pub struct PickResolver {
    pool: PgPool,
    publisher: EventPublisher,
}

impl PickResolver {
    pub fn new(pool: PgPool, publisher: EventPublisher) -> Self {
        Self { pool, publisher }
    }

    /// Run the PickResolver until shutdown is signaled.
    pub async fn run(self, mut subscriber: EventSubscriber, mut shutdown_rx: watch::Receiver<bool>) {
        info!("PickResolver started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("PickResolver received shutdown signal");
                        break;
                    }
                }

                notice = subscriber.recv() => {
                    let event: PropUpdated = match notice.decode() {
                        Ok(event) => event,
                        Err(e) => {
                            error!(error = %e, "Received malformed prop_updated message");
                            continue;
                        }
                    };

                    if let Err(e) = self.process(event).await {
                        error!(prop_id = event.id, error = %e, "Failed to resolve picks");
                    }
                }
            }
        }

        info!("PickResolver shutdown complete");
    }
}

/// (over, under) statuses for a resolved prop, by how the final value
/// landed against the line.
fn resolved_outcome(value_vs_line: Ordering) -> (PickStatus, PickStatus) {
    match value_vs_line {
        Ordering::Greater => (PickStatus::Hit, PickStatus::Missed),
        Ordering::Equal => (PickStatus::Tie, PickStatus::Tie),
        Ordering::Less => (PickStatus::Missed, PickStatus::Hit),
    }
}

/// Apply the transition table for one prop; one statement per branch.
async fn apply_transitions(
    conn: &mut PgConnection,
    prop: &PropSnapshot,
) -> Result<Vec<PickRef>, sqlx::Error> {
    match prop.status {
        PropStatus::DidNotPlay => {
            Pick::resolve_all_tx(conn, prop.id, PickStatus::DidNotPlay).await
        }
        PropStatus::Resolved => {
            let Some(value) = prop.current_value else {
                warn!(prop_id = prop.id, "Resolved prop has no current value");
                return Ok(Vec::new());
            };
            let Some(ordering) = value.partial_cmp(&prop.line) else {
                warn!(prop_id = prop.id, "Prop value is not comparable");
                return Ok(Vec::new());
            };
            let (over, under) = resolved_outcome(ordering);
            Pick::resolve_over_under_tx(conn, prop.id, over, under).await
        }
        PropStatus::NotResolved => {
            // A live value already past the line locks the overs in early;
            // everything else just refreshes downstream caches.
            if prop.current_value.is_some_and(|value| value > prop.line) {
                Pick::resolve_side_tx(conn, prop.id, PickChoice::Over, PickStatus::Hit).await?;
            }
            Pick::refs_for_prop_tx(conn, prop.id).await
        }
    }
}

impl Processor<PropUpdated> for PickResolver {
    type Output = ();
    type Error = PickResolveError;

    async fn process(&self, event: PropUpdated) -> Result<(), PickResolveError> {
        let mut tx = self.pool.begin().await?;

        let Some(prop) = Prop::snapshot_tx(&mut tx, event.id).await? else {
            warn!(prop_id = event.id, "No prop found");
            tx.rollback().await?;
            return Ok(());
        };

        let affected = apply_transitions(&mut tx, &prop).await?;
        tx.commit().await?;

        for pick in &affected {
            self.publisher.publish(&PickResolved { id: pick.id }).await;
            self.publisher
                .publish(&InvalidateQueries {
                    keys: vec![json!(["pick", pick.id]), json!(["parlay", pick.parlay_id])],
                })
                .await;
        }

        if affected.is_empty() {
            debug!(prop_id = prop.id, "No picks to update");
        } else {
            info!(
                prop_id = prop.id,
                picks = affected.len(),
                "Resolved picks for prop"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_over_the_line_hits_overs_and_misses_unders() {
        // line 20.5, final value 24
        let ordering = 24.0f64.partial_cmp(&20.5).unwrap();
        assert_eq!(
            resolved_outcome(ordering),
            (PickStatus::Hit, PickStatus::Missed)
        );
    }

    #[test]
    fn value_on_the_line_ties_both_sides() {
        assert_eq!(
            resolved_outcome(Ordering::Equal),
            (PickStatus::Tie, PickStatus::Tie)
        );
    }

    #[test]
    fn value_under_the_line_flips_the_sides() {
        assert_eq!(
            resolved_outcome(Ordering::Less),
            (PickStatus::Missed, PickStatus::Hit)
        );
    }
}
