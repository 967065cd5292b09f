//! Event system for the settlement cascade.
//!
//! Control messages travel over Postgres `LISTEN`/`NOTIFY` so that every
//! stage can run in its own OS process. Messages are small JSON bodies
//! carrying identifiers only; handlers re-fetch current state from the
//! database, which keeps every stage idempotent and order-insensitive.
//!
//! # Event Flow
//!
//! 1. `stats_updated {league}` -> `PropStatusUpdater`
//! 2. `PropStatusUpdater` emits `prop_updated {id}` -> `PickResolver`
//! 3. `PickResolver` emits `pick_resolved {id}` -> `ParlaySettlementEngine`
//! 4. `ParlaySettlementEngine` emits `parlay_resolved {parlayId}` -> `MatchSettlementEngine`
//! 5. `MatchesPoller` emits `match_check {matchId, ...}` -> `MatchSettlementEngine`
//!
//! `invalidate_queries` and `notification` fan out to external consumers
//! (cache layer, push-notification service) and have no subscriber here.
//!
//! There is no persistence or replay: a dropped message is compensated by
//! the poller, never by the bus.

pub mod bus;
pub mod types;

pub use bus::{EventPublisher, EventSubscriber, Notice, PUBLISH_BUFFER};
pub use types::{
    BusMessage, InvalidateQueries, MatchCheck, Notification, ParlayResolved, PickResolved,
    PropUpdated, StatsUpdated, stats_updated_channel,
};
