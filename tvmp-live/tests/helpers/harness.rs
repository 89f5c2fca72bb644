//! Playback harness
//!
//! Builds the full manager graph (buffer manager, controller, surf
//! coordinator, slot grid) over an in-memory catalog and a simulated
//! engine, with delays short enough for tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tvmp_common::{Channel, ChannelId};
use tvmp_live::api::AppContext;
use tvmp_live::catalog::StaticCatalog;
use tvmp_live::config::{BufferSettings, MultiviewSettings, SurfSettings};
use tvmp_live::engine::SimulatedEngine;
use tvmp_live::playback::{BufferManager, ChannelSurfCoordinator, LiveController, SlotGrid};
use tvmp_live::SharedState;

pub fn channel_url(id: &str) -> String {
    format!("http://tv.test/{}/index.m3u8", id)
}

/// Channels in the given order, numbered from 1
pub fn channels(ids: &[&str]) -> Vec<Channel> {
    ids.iter()
        .enumerate()
        .map(|(n, id)| Channel::new(*id, (n + 1).to_string(), id.to_uppercase(), channel_url(id)))
        .collect()
}

/// Poll `check` until it returns true or `timeout` passes
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub struct Harness {
    pub engine: Arc<SimulatedEngine>,
    pub catalog: Arc<StaticCatalog>,
    pub state: Arc<SharedState>,
    pub buffer: Arc<BufferManager>,
    pub controller: Arc<LiveController>,
    pub surf: Arc<ChannelSurfCoordinator>,
    pub grid: Arc<SlotGrid>,
}

impl Harness {
    pub fn builder(ids: &[&str]) -> HarnessBuilder {
        HarnessBuilder::new(ids)
    }

    /// Auto-ready engine, 1ms settle delay, 2 initial slots, 20ms surf ticks
    pub fn new(ids: &[&str]) -> Self {
        Self::builder(ids).build()
    }

    pub fn ordered(&self) -> Vec<Channel> {
        tvmp_live::catalog::ChannelCatalog::ordered_channels(self.catalog.as_ref())
    }

    pub fn app_context(&self) -> AppContext {
        AppContext {
            state: self.state.clone(),
            catalog: self.catalog.clone(),
            controller: self.controller.clone(),
            surf: self.surf.clone(),
            grid: self.grid.clone(),
        }
    }

    pub async fn buffered(&self) -> Vec<String> {
        self.buffer
            .buffered_channels()
            .await
            .into_iter()
            .map(|id| id.to_string())
            .collect()
    }

    /// Wait until exactly `expected` (sorted) is buffered
    pub async fn wait_for_buffered(&self, expected: &[&str]) -> bool {
        wait_for(Duration::from_secs(2), || async move { self.buffered().await == expected }).await
    }

    pub async fn wait_until_ready(&self, id: &str) -> bool {
        let id = ChannelId::new(id);
        wait_for(Duration::from_secs(2), move || {
            let id = id.clone();
            async move { self.buffer.get_ready(&id).await.is_some() }
        })
        .await
    }
}

pub struct HarnessBuilder {
    channels: Vec<Channel>,
    engine: SimulatedEngine,
    buffer: BufferSettings,
    multiview: MultiviewSettings,
    surf: SurfSettings,
}

impl HarnessBuilder {
    fn new(ids: &[&str]) -> Self {
        Self {
            channels: channels(ids),
            engine: SimulatedEngine::new(Duration::from_millis(1)).with_history(),
            buffer: BufferSettings {
                max_buffer_count: 2,
                settle_delay_ms: 1,
                low_buffer_target_secs: 5,
            },
            multiview: MultiviewSettings {
                initial_slots: 2,
                dvr_buffer_ceiling_secs: 3600,
            },
            surf: SurfSettings {
                countdown_secs: 3,
                tick_ms: 20,
                favorites_only: false,
            },
        }
    }

    pub fn engine(mut self, engine: SimulatedEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.buffer.settle_delay_ms = ms;
        self
    }

    pub fn initial_slots(mut self, count: usize) -> Self {
        self.multiview.initial_slots = count;
        self
    }

    pub fn surf_tick_ms(mut self, ms: u64) -> Self {
        self.surf.tick_ms = ms;
        self
    }

    pub fn favorites_only(mut self) -> Self {
        self.surf.favorites_only = true;
        self
    }

    pub fn build(self) -> Harness {
        let engine = Arc::new(self.engine);
        let catalog = Arc::new(StaticCatalog::new(self.channels));
        let state = Arc::new(SharedState::new());

        let buffer = Arc::new(BufferManager::new(
            engine.clone(),
            catalog.clone(),
            state.clone(),
            self.buffer,
        ));
        let controller = Arc::new(LiveController::new(
            engine.clone(),
            catalog.clone(),
            state.clone(),
            buffer.clone(),
            self.surf.favorites_only,
        ));
        let surf = Arc::new(ChannelSurfCoordinator::new(controller.clone(), state.clone(), self.surf));
        let grid = Arc::new(SlotGrid::new(engine.clone(), catalog.clone(), state.clone(), self.multiview));

        Harness {
            engine,
            catalog,
            state,
            buffer,
            controller,
            surf,
            grid,
        }
    }
}
