//! Settlement processors.
//!
//! Each processor consumes one (or two) bus channels and owns the terminal
//! field of exactly one entity, so write–write contention across stages
//! cannot happen by construction:
//!
//! - `PropStatusUpdater`: `stats_updated` -> mutates props, emits `prop_updated`
//! - `PickResolver`: `prop_updated` -> mutates picks, emits `pick_resolved`
//! - `ParlaySettlementEngine`: `pick_resolved` -> mutates parlays/balances,
//!   emits `parlay_resolved`
//! - `MatchSettlementEngine`: `parlay_resolved` + `match_check` -> mutates
//!   matches/ratings/XP
//! - `MatchesPoller`: periodic failsafe re-emitting `match_check`
//!
//! Handlers never trust event order: every stage re-derives readiness from
//! persisted state under row locks, so duplicate or out-of-order delivery
//! settles nothing twice.

pub mod match_settlement;
pub mod matches_poller;
pub mod parlay_settlement;
pub mod pick_resolver;
pub mod prop_updater;

pub use match_settlement::MatchSettlementEngine;
pub use matches_poller::MatchesPoller;
pub use parlay_settlement::ParlaySettlementEngine;
pub use pick_resolver::PickResolver;
pub use prop_updater::PropStatusUpdater;
