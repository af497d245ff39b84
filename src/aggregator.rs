//! Per-destination orchestration of the five feeds
//!
//! An aggregator pulls every applicable source for one destination through
//! the shared caches, keeps the latest value of each, and publishes a
//! [`SafetySnapshot`] on a watch channel whenever one of them changes.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::cache::{CacheRead, SwrCache};
use crate::destinations::{self, Applicability};
use crate::models::{
    AuroraForecast, AuroraParams, AvalancheData, AvalancheParams, Coordinates, Destination,
    Language, OceanSnapshot, RoadData, RoadRegion, WeatherSnapshot,
};
use crate::safety::{OverallSafety, compute_overall_safety};
use crate::sources::{SourceCaches, Sourced};

/// Cloud cover assumed when the weather reports precipitation
const OVERCAST_CLOUD_COVER: f64 = 80.0;
/// Cloud cover assumed otherwise, including before the weather is known
const CLEAR_CLOUD_COVER: f64 = 30.0;

/// Everything known about a destination right now
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetySnapshot {
    pub destination: Destination,
    pub weather: Option<WeatherSnapshot>,
    pub avalanche: Option<AvalancheData>,
    pub roads: Option<RoadData>,
    pub ocean: Option<OceanSnapshot>,
    pub aurora: Option<AuroraForecast>,
    pub show_aurora: bool,
    pub show_ocean: bool,
    /// Weather or roads have not arrived yet
    pub loading: bool,
    /// A source is being revalidated
    pub refreshing: bool,
    pub overall_safety: OverallSafety,
    /// Sources currently serving their static fallback
    pub degraded: Vec<&'static str>,
}

impl SafetySnapshot {
    fn empty(destination: &Destination, applicability: Applicability) -> Self {
        Self {
            destination: destination.clone(),
            weather: None,
            avalanche: None,
            roads: None,
            ocean: None,
            aurora: None,
            show_aurora: applicability.aurora,
            show_ocean: applicability.ocean,
            loading: true,
            refreshing: false,
            overall_safety: OverallSafety::Safe,
            degraded: Vec::new(),
        }
    }

    fn recompute(&mut self) {
        self.loading = self.weather.is_none() || self.roads.is_none();
        self.overall_safety = compute_overall_safety(
            self.weather.as_ref(),
            self.avalanche.as_ref(),
            self.roads.as_ref(),
        );
    }

    fn mark_degraded(&mut self, source: &'static str, degraded: bool) {
        self.degraded.retain(|name| *name != source);
        if degraded {
            self.degraded.push(source);
            self.degraded.sort_unstable();
        }
    }
}

/// Aurora cloud cover estimated from the weather snapshot
#[must_use]
pub fn estimated_cloud_cover(weather: Option<&WeatherSnapshot>) -> f64 {
    match weather {
        Some(weather) if weather.precipitation > 0.0 => OVERCAST_CLOUD_COVER,
        _ => CLEAR_CLOUD_COVER,
    }
}

/// How a sync pulls from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pull {
    /// Cached value if any, first fetch otherwise
    Read,
    /// Cached value while fresh, otherwise wait for a (deduplicated) revalidation
    Revalidate,
    /// New upstream call regardless of freshness
    Force,
}

async fn pull<P, V>(cache: &SwrCache<P, V>, params: &P, mode: Pull) -> Result<Option<Sourced<V>>>
where
    P: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    match mode {
        Pull::Read => Ok(Some(cache.get_or_fetch(params).await?.into_sourced())),
        Pull::Revalidate => match cache.get(params) {
            Some(read) if !read.is_stale => Ok(Some(read.into_sourced())),
            // A stale read has already started the fetch; this joins it
            _ => match cache.revalidate(params, false).await? {
                Some(sourced) => Ok(Some(sourced)),
                None => Ok(cache.get(params).map(CacheRead::into_sourced)),
            },
        },
        Pull::Force => cache.revalidate(params, true).await,
    }
}

struct AggregatorInner {
    destination: Destination,
    applicability: Applicability,
    region: RoadRegion,
    language: Language,
    caches: SourceCaches,
    state: watch::Sender<SafetySnapshot>,
}

/// Safety data for one destination
#[derive(Clone)]
pub struct SafetyAggregator {
    inner: Arc<AggregatorInner>,
}

impl SafetyAggregator {
    pub fn new(destination: Destination, language: Language, caches: SourceCaches) -> Self {
        let applicability = destinations::applicability(&destination);
        let region = destinations::region_for(&destination.name);
        let (state, _) = watch::channel(SafetySnapshot::empty(&destination, applicability));

        Self {
            inner: Arc::new(AggregatorInner {
                destination,
                applicability,
                region,
                language,
                caches,
                state,
            }),
        }
    }

    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.inner.destination
    }

    #[must_use]
    pub fn applicability(&self) -> Applicability {
        self.inner.applicability
    }

    #[must_use]
    pub fn region(&self) -> RoadRegion {
        self.inner.region
    }

    /// Receives a new snapshot every time a source value changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SafetySnapshot> {
        self.inner.state.subscribe()
    }

    /// Current state with live `refreshing` and a freshly computed verdict
    #[must_use]
    pub fn snapshot(&self) -> SafetySnapshot {
        let mut snapshot = self.inner.state.borrow().clone();
        snapshot.recompute();
        snapshot.refreshing = self.is_refreshing();
        snapshot
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.snapshot().loading
    }

    /// True while any applicable source is mid-revalidation
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        let caches = &self.inner.caches;
        let applicability = self.inner.applicability;
        let weather = self.inner.state.borrow().weather.clone();

        caches.weather.is_revalidating(&self.coordinates())
            || caches.avalanche.is_revalidating(&self.avalanche_params())
            || caches.roads.is_revalidating(&self.inner.region)
            || (applicability.ocean && caches.ocean.is_revalidating(&self.coordinates()))
            || (applicability.aurora
                && caches
                    .aurora
                    .is_revalidating(&self.aurora_params(weather.as_ref())))
    }

    /// Fetches every applicable source concurrently. Cached values are used
    /// as they are; stale ones are revalidated in the background.
    #[instrument(name = "aggregate_safety", skip(self), fields(destination = %self.inner.destination.name))]
    pub async fn load(&self) -> SafetySnapshot {
        self.sync_all(Pull::Read).await
    }

    /// Revalidates every applicable source immediately, ignoring freshness
    #[instrument(name = "refetch_all", skip(self), fields(destination = %self.inner.destination.name))]
    pub async fn refetch_all(&self) -> SafetySnapshot {
        self.sync_all(Pull::Force).await
    }

    /// Starts one task per applicable source that revalidates it at the
    /// source's refresh interval. Abort the handles to stop.
    pub fn spawn_auto_refresh(&self) -> Vec<JoinHandle<()>> {
        let caches = &self.inner.caches;
        let mut handles = vec![
            self.spawn_refresher(caches.weather.policy().refresh_interval, |aggregator| {
                async move {
                    aggregator.sync_weather(Pull::Revalidate).await;
                }
                .boxed()
            }),
            self.spawn_refresher(caches.avalanche.policy().refresh_interval, |aggregator| {
                async move { aggregator.sync_avalanche(Pull::Revalidate).await }.boxed()
            }),
            self.spawn_refresher(caches.roads.policy().refresh_interval, |aggregator| {
                async move { aggregator.sync_roads(Pull::Revalidate).await }.boxed()
            }),
        ];

        if self.inner.applicability.ocean {
            handles.push(
                self.spawn_refresher(caches.ocean.policy().refresh_interval, |aggregator| {
                    async move { aggregator.sync_ocean(Pull::Revalidate).await }.boxed()
                }),
            );
        }
        if self.inner.applicability.aurora {
            handles.push(
                self.spawn_refresher(caches.aurora.policy().refresh_interval, |aggregator| {
                    async move {
                        let weather = aggregator.inner.state.borrow().weather.clone();
                        aggregator.sync_aurora(Pull::Revalidate, weather.as_ref()).await;
                    }
                    .boxed()
                }),
            );
        }

        debug!(
            "Auto refresh started for {} ({} sources)",
            self.inner.destination.name,
            handles.len()
        );
        handles
    }

    fn spawn_refresher<F>(&self, period: Duration, refresh: F) -> JoinHandle<()>
    where
        F: Fn(SafetyAggregator) -> BoxFuture<'static, ()> + Send + 'static,
    {
        let aggregator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                refresh(aggregator.clone()).await;
            }
        })
    }

    fn coordinates(&self) -> Coordinates {
        self.inner.destination.coordinates()
    }

    fn avalanche_params(&self) -> AvalancheParams {
        AvalancheParams::new(self.coordinates(), self.inner.language)
    }

    fn aurora_params(&self, weather: Option<&WeatherSnapshot>) -> AuroraParams {
        AuroraParams::new(estimated_cloud_cover(weather), self.inner.destination.lat)
    }

    async fn sync_all(&self, mode: Pull) -> SafetySnapshot {
        // Aurora's cloud cover depends on the weather, so it runs behind it
        let weather_then_aurora = async {
            let weather = self.sync_weather(mode).await;
            self.sync_aurora(mode, weather.as_ref()).await;
        };

        tokio::join!(
            weather_then_aurora,
            self.sync_avalanche(mode),
            self.sync_roads(mode),
            self.sync_ocean(mode),
        );
        self.snapshot()
    }

    async fn sync_weather(&self, mode: Pull) -> Option<WeatherSnapshot> {
        let result = pull(&self.inner.caches.weather, &self.coordinates(), mode).await;
        self.apply("weather", result, |state, value| state.weather = Some(value))
    }

    async fn sync_avalanche(&self, mode: Pull) {
        let result = pull(&self.inner.caches.avalanche, &self.avalanche_params(), mode).await;
        self.apply("avalanche", result, |state, value| state.avalanche = Some(value));
    }

    async fn sync_roads(&self, mode: Pull) {
        let result = pull(&self.inner.caches.roads, &self.inner.region, mode).await;
        self.apply("roads", result, |state, value| state.roads = Some(value));
    }

    async fn sync_ocean(&self, mode: Pull) {
        if !self.inner.applicability.ocean {
            return;
        }
        let result = pull(&self.inner.caches.ocean, &self.coordinates(), mode).await;
        self.apply("ocean", result, |state, value| state.ocean = Some(value));
    }

    async fn sync_aurora(&self, mode: Pull, weather: Option<&WeatherSnapshot>) {
        if !self.inner.applicability.aurora {
            return;
        }
        let params = self.aurora_params(weather);
        let result = pull(&self.inner.caches.aurora, &params, mode).await;
        self.apply("aurora", result, |state, value| state.aurora = Some(value));
    }

    /// Stores a pulled value and publishes the new snapshot
    fn apply<V: Clone>(
        &self,
        source: &'static str,
        result: Result<Option<Sourced<V>>>,
        set: impl FnOnce(&mut SafetySnapshot, V),
    ) -> Option<V> {
        let sourced = match result {
            Ok(Some(sourced)) => sourced,
            Ok(None) => return None,
            Err(e) => {
                warn!("{} unavailable for {}: {}", source, self.inner.destination.name, e);
                return None;
            }
        };

        let value = sourced.value.clone();
        let refreshing = self.is_refreshing();
        self.inner.state.send_modify(|state| {
            set(state, sourced.value);
            state.mark_degraded(source, sourced.degraded);
            state.recompute();
            state.refreshing = refreshing;
        });
        Some(value)
    }
}
