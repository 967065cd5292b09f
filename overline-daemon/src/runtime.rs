//! Component wiring: subscribers, publisher, and processor tasks.

use crate::config::FileConfig;
use clap::ValueEnum;
use overline_core::events::{
    BusMessage, EventPublisher, EventSubscriber, MatchCheck, ParlayResolved, PickResolved,
    PropUpdated, StatsUpdated, stats_updated_channel,
};
use overline_core::feed::FeedClient;
use overline_core::processors::{
    MatchSettlementEngine, MatchesPoller, ParlaySettlementEngine, PickResolver, PropStatusUpdater,
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Settlement components this binary can host.
///
/// One process can run any subset, so deployments may scale stages
/// independently; correctness never depends on colocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Component {
    PropUpdater,
    PickResolver,
    ParlaySettlement,
    MatchSettlement,
    MatchesPoller,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::PropUpdater,
        Component::PickResolver,
        Component::ParlaySettlement,
        Component::MatchSettlement,
        Component::MatchesPoller,
    ];
}

/// Spawn the publisher and every selected component.
///
/// Returns the task handles so the caller can join them after signaling
/// shutdown through the watch channel.
pub async fn spawn_components(
    pool: &PgPool,
    database_url: &str,
    config: &FileConfig,
    components: &[Component],
    shutdown_rx: &watch::Receiver<bool>,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();

    let (publisher, publisher_handle) =
        EventPublisher::spawn(database_url.to_string(), shutdown_rx.clone());
    handles.push(publisher_handle);

    for component in components {
        match component {
            Component::PropUpdater => {
                let mut channels = vec![StatsUpdated::CHANNEL.to_string()];
                channels.extend(
                    config
                        .settlement
                        .leagues
                        .iter()
                        .map(|league| stats_updated_channel(*league)),
                );
                let subscriber =
                    EventSubscriber::connect(pool, channels.iter().map(String::as_str)).await?;
                let feed = FeedClient::new(&config.feed.base_url, &config.feed.api_token);
                let updater = PropStatusUpdater::new(pool.clone(), publisher.clone(), feed);
                handles.push(tokio::spawn(updater.run(subscriber, shutdown_rx.clone())));
            }
            Component::PickResolver => {
                let subscriber = EventSubscriber::connect(pool, [PropUpdated::CHANNEL]).await?;
                let resolver = PickResolver::new(pool.clone(), publisher.clone());
                handles.push(tokio::spawn(resolver.run(subscriber, shutdown_rx.clone())));
            }
            Component::ParlaySettlement => {
                let subscriber = EventSubscriber::connect(pool, [PickResolved::CHANNEL]).await?;
                let engine = Arc::new(ParlaySettlementEngine::new(pool.clone(), publisher.clone()));
                handles.push(tokio::spawn(engine.run(subscriber, shutdown_rx.clone())));
            }
            Component::MatchSettlement => {
                let subscriber =
                    EventSubscriber::connect(pool, [ParlayResolved::CHANNEL, MatchCheck::CHANNEL])
                        .await?;
                let engine = MatchSettlementEngine::new(pool.clone(), publisher.clone());
                handles.push(tokio::spawn(engine.run(subscriber, shutdown_rx.clone())));
            }
            Component::MatchesPoller => {
                let interval =
                    std::time::Duration::from_secs(config.settlement.poll_interval_secs);
                let poller = MatchesPoller::new(pool.clone(), publisher.clone(), interval);
                handles.push(tokio::spawn(poller.run(shutdown_rx.clone())));
            }
        }
    }

    Ok(handles)
}
