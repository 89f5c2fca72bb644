//! Multiview slot grid
//!
//! Up to four simultaneously playing tiles. Each slot owns its own session
//! and DVR state; at most one slot is audible at a time. Slot indices are
//! positions in the slot list, so they stay contiguous (0..count-1) through
//! any removal.
//!
//! Sessions are opened without holding the grid lock. When the new session
//! comes back, the slot it was meant for is found again by the instance id
//! of the session it replaces; if that slot has changed in the meantime the
//! new session is released and the grid is left alone.

use crate::catalog::ChannelCatalog;
use crate::config::MultiviewSettings;
use crate::engine::{SessionOptions, StreamEngine};
use crate::error::{Error, Result};
use crate::playback::session::{observe_readiness, PlaybackSession};
use crate::state::SharedState;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tvmp_common::events::{FailureKind, MultiviewLayout, SessionReadiness, SlotInfo, TvmpEvent};
use tvmp_common::{Channel, ChannelId, DvrState};
use uuid::Uuid;

/// Most slots a grid can hold
pub const MAX_SLOTS: usize = 4;

/// One tile: channel, its session, audio and DVR state
struct MultiviewSlot {
    channel: Channel,
    session: PlaybackSession,
    is_muted: bool,
    dvr: DvrState,
    is_buffering: bool,
    observer: JoinHandle<()>,
}

impl MultiviewSlot {
    fn release(self) {
        self.observer.abort();
        self.session.release();
    }

    fn info(&self, index: usize) -> SlotInfo {
        SlotInfo {
            index,
            channel_id: self.channel.id.clone(),
            channel_name: self.channel.name.clone(),
            session_id: self.session.instance_id(),
            readiness: self.session.readiness().clone(),
            is_muted: self.is_muted,
            is_buffering: self.is_buffering,
            dvr: self.dvr,
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.is_muted = muted;
        self.session.set_muted(muted);
    }
}

#[derive(Default)]
struct GridInner {
    slots: Vec<MultiviewSlot>,
}

impl GridInner {
    fn position_of(&self, instance_id: Uuid) -> Option<usize> {
        self.slots.iter().position(|slot| slot.session.instance_id() == instance_id)
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut MultiviewSlot> {
        let count = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or_else(|| Error::InvalidOperation(format!("slot {} out of range (count {})", index, count)))
    }

    fn snapshot(&self) -> Vec<SlotInfo> {
        self.slots.iter().enumerate().map(|(index, slot)| slot.info(index)).collect()
    }

    fn layout(&self) -> Option<MultiviewLayout> {
        MultiviewLayout::for_count(self.slots.len())
    }
}

impl Drop for GridInner {
    fn drop(&mut self) {
        for slot in self.slots.drain(..) {
            slot.release();
        }
    }
}

pub struct SlotGrid {
    engine: Arc<dyn StreamEngine>,
    catalog: Arc<dyn ChannelCatalog>,
    state: Arc<SharedState>,
    settings: MultiviewSettings,
    inner: Arc<Mutex<GridInner>>,
}

impl SlotGrid {
    pub fn new(
        engine: Arc<dyn StreamEngine>,
        catalog: Arc<dyn ChannelCatalog>,
        state: Arc<SharedState>,
        settings: MultiviewSettings,
    ) -> Self {
        Self {
            engine,
            catalog,
            state,
            settings,
            inner: Arc::new(Mutex::new(GridInner::default())),
        }
    }

    /// Create the initial 1-2 slots from the head of `channels`
    ///
    /// Slot 0 gets audio. Replaces any slots already present; if a session
    /// cannot be opened the grid is left as it was.
    pub async fn initialize(&self, channels: &[Channel]) -> Result<()> {
        if channels.is_empty() {
            return Err(Error::InvalidOperation("no channels for multiview".to_string()));
        }

        let count = self.settings.initial_slots.clamp(1, 2);
        let mut opened = Vec::with_capacity(count);
        for i in 0..count {
            let channel = channels[i % channels.len()].clone();
            let muted = i != 0;
            match self.open_tile(&channel, muted).await {
                Ok(session) => opened.push((channel, session)),
                Err(e) => {
                    self.publish_failure(&channel.id, Some(i), &e);
                    for (_, session) in opened {
                        session.release();
                    }
                    return Err(e);
                }
            }
        }

        let mut inner = self.inner.lock().await;
        for slot in inner.slots.drain(..) {
            slot.release();
        }
        for (channel, session) in opened {
            let slot = self.new_slot(channel, session);
            inner.slots.push(slot);
        }

        info!("Multiview initialized with {} slots", inner.slots.len());
        self.publish_grid(&inner);
        Ok(())
    }

    /// Append a muted, auto-playing slot showing the first channel not
    /// already on screen. Returns the new slot's index.
    pub async fn add_slot(&self) -> Result<usize> {
        let channel = {
            let inner = self.inner.lock().await;
            if inner.slots.len() >= MAX_SLOTS {
                return Err(Error::InvalidOperation(format!("grid already has {} slots", MAX_SLOTS)));
            }

            let ordered = self.catalog.ordered_channels();
            let unused = ordered
                .iter()
                .find(|c| !inner.slots.iter().any(|slot| slot.channel.id == c.id))
                .or_else(|| ordered.first())
                .cloned();
            unused.ok_or_else(|| Error::InvalidOperation("channel list is empty".to_string()))?
        };

        let session = self.open_tile(&channel, true).await.map_err(|e| {
            self.publish_failure(&channel.id, None, &e);
            e
        })?;

        let mut inner = self.inner.lock().await;
        if inner.slots.len() >= MAX_SLOTS {
            drop(inner);
            session.release();
            return Err(Error::InvalidOperation(format!("grid already has {} slots", MAX_SLOTS)));
        }

        let slot = self.new_slot(channel, session);
        inner.slots.push(slot);
        let index = inner.slots.len() - 1;

        debug!("Added multiview slot {} ({:?})", index, inner.layout());
        self.publish_grid(&inner);
        Ok(index)
    }

    /// Release and remove slot `index`; later slots shift down by one.
    /// Audio focus is not moved if the removed slot had it.
    pub async fn remove_slot(&self, index: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.slots.len() <= 1 {
            return Err(Error::InvalidOperation("cannot remove the last slot".to_string()));
        }
        inner.slot_mut(index)?;

        let slot = inner.slots.remove(index);
        debug!("Removing multiview slot {} ({})", index, slot.channel.id);
        slot.release();

        self.publish_grid(&inner);
        Ok(())
    }

    /// Show `channel_id` in slot `index` with a fresh session at the live
    /// edge. The slot's mute flag carries over.
    pub async fn set_channel(&self, index: usize, channel_id: &ChannelId) -> Result<()> {
        let channel = self
            .catalog
            .channel(channel_id)
            .ok_or_else(|| Error::InvalidOperation(format!("unknown channel {}", channel_id)))?;

        let (instance_id, muted) = {
            let mut inner = self.inner.lock().await;
            let slot = inner.slot_mut(index)?;
            (slot.session.instance_id(), slot.is_muted)
        };

        self.replace_session(instance_id, channel, muted).await.map(|_| ())
    }

    /// Toggle audio on slot `index`. Unmuting takes audio focus; muting
    /// leaves every slot silent. Returns the new mute flag.
    pub async fn toggle_mute(&self, index: usize) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let muted = inner.slot_mut(index)?.is_muted;

        if muted {
            Self::focus(&mut inner, index);
        } else {
            inner.slot_mut(index)?.set_muted(true);
        }

        self.publish_grid(&inner);
        Ok(!muted)
    }

    /// Make slot `index` the only audible slot
    pub async fn set_audio_focus(&self, index: usize) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.slot_mut(index)?;
        Self::focus(&mut inner, index);
        self.publish_grid(&inner);
        Ok(())
    }

    fn focus(inner: &mut GridInner, index: usize) {
        // Mute the rest first so two slots are never audible together
        for (i, slot) in inner.slots.iter_mut().enumerate() {
            if i != index && !slot.is_muted {
                slot.set_muted(true);
            }
        }
        if let Some(slot) = inner.slots.get_mut(index) {
            slot.set_muted(false);
        }
    }

    /// Index of the audible slot, if any
    pub async fn audio_focus(&self) -> Option<usize> {
        let inner = self.inner.lock().await;
        inner.slots.iter().position(|slot| !slot.is_muted)
    }

    pub async fn pause(&self, index: usize) -> Result<DvrState> {
        self.apply_dvr(index, |slot, _| {
            let next = slot.dvr.pause();
            if next != slot.dvr {
                slot.session.pause();
            }
            next
        })
        .await
    }

    pub async fn resume(&self, index: usize) -> Result<DvrState> {
        self.apply_dvr(index, |slot, _| {
            let next = slot.dvr.resume();
            if next != slot.dvr {
                slot.session.play();
            }
            next
        })
        .await
    }

    /// Step `seconds` further behind live (capped at the DVR window)
    pub async fn rewind(&self, index: usize, seconds: u32) -> Result<DvrState> {
        self.apply_dvr(index, |slot, ceiling| {
            let next = slot.dvr.rewind(seconds, ceiling);
            slot.session.seek(next.offset_secs());
            slot.session.play();
            next
        })
        .await
    }

    /// Step `seconds` toward live (stops at the live edge)
    pub async fn fast_forward(&self, index: usize, seconds: u32) -> Result<DvrState> {
        self.apply_dvr(index, |slot, ceiling| {
            let next = slot.dvr.fast_forward(seconds, ceiling);
            slot.session.seek(next.offset_secs());
            slot.session.play();
            next
        })
        .await
    }

    /// Reload slot `index` from the live stream. On failure the slot keeps
    /// its previous session and DVR state.
    pub async fn jump_to_live(&self, index: usize) -> Result<DvrState> {
        let (instance_id, channel, muted) = {
            let mut inner = self.inner.lock().await;
            let slot = inner.slot_mut(index)?;
            (slot.session.instance_id(), slot.channel.clone(), slot.is_muted)
        };

        let (_, dvr) = self.replace_session(instance_id, channel, muted).await?;
        Ok(dvr)
    }

    pub async fn pause_all(&self) -> Result<()> {
        for index in 0..self.slot_count().await {
            self.pause(index).await?;
        }
        Ok(())
    }

    pub async fn resume_all(&self) -> Result<()> {
        for index in 0..self.slot_count().await {
            self.resume(index).await?;
        }
        Ok(())
    }

    /// Reload every slot from live. Every slot is attempted; the first
    /// failure is returned.
    pub async fn jump_all_to_live(&self) -> Result<()> {
        let targets: Vec<(Uuid, Channel, bool)> = {
            let inner = self.inner.lock().await;
            inner
                .slots
                .iter()
                .map(|slot| (slot.session.instance_id(), slot.channel.clone(), slot.is_muted))
                .collect()
        };

        let mut first_error = None;
        for (instance_id, channel, muted) in targets {
            if let Err(e) = self.replace_session(instance_id, channel, muted).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Align every paused or time-shifted slot to the smallest offset among
    /// them. Live slots are left alone.
    pub async fn sync_all_streams(&self) -> Result<Option<u32>> {
        let mut inner = self.inner.lock().await;

        let target = inner
            .slots
            .iter()
            .filter(|slot| !slot.dvr.is_live())
            .map(|slot| slot.dvr.offset_secs())
            .min();
        let Some(target) = target else {
            return Ok(None);
        };

        let mut changed = Vec::new();
        for (index, slot) in inner.slots.iter_mut().enumerate() {
            if slot.dvr.is_live() {
                continue;
            }
            let next = slot.dvr.with_offset(target);
            if next.offset_secs() != slot.dvr.offset_secs() {
                slot.session.seek(target);
            }
            if next != slot.dvr {
                slot.dvr = next;
                changed.push((index, next));
            }
        }

        info!("Synced {} slots to {}s behind live", changed.len(), target);
        for (index, dvr) in changed {
            self.publish_dvr(index, dvr);
        }
        self.publish_grid(&inner);
        Ok(Some(target))
    }

    /// Release every slot; safe to call more than once
    pub async fn cleanup(&self) {
        let mut inner = self.inner.lock().await;
        if inner.slots.is_empty() {
            return;
        }
        let count = inner.slots.len();
        for slot in inner.slots.drain(..) {
            slot.release();
        }
        info!("Released {} multiview slots", count);
        self.publish_grid(&inner);
    }

    pub async fn snapshot(&self) -> Vec<SlotInfo> {
        self.inner.lock().await.snapshot()
    }

    pub async fn layout(&self) -> Option<MultiviewLayout> {
        self.inner.lock().await.layout()
    }

    pub async fn slot_count(&self) -> usize {
        self.inner.lock().await.slots.len()
    }

    async fn apply_dvr<F>(&self, index: usize, transition: F) -> Result<DvrState>
    where
        F: FnOnce(&mut MultiviewSlot, u32) -> DvrState,
    {
        let ceiling = self.settings.dvr_buffer_ceiling_secs;
        let mut inner = self.inner.lock().await;
        let slot = inner.slot_mut(index)?;

        let next = transition(slot, ceiling);
        if next == slot.dvr {
            return Ok(next);
        }
        debug!("Slot {} DVR {:?} -> {:?}", index, slot.dvr, next);
        slot.dvr = next;

        self.publish_dvr(index, next);
        self.publish_grid(&inner);
        Ok(next)
    }

    /// Open a fresh session for `channel` and swap it into the slot that
    /// currently holds `instance_id`. The swapped-in slot is back at live;
    /// returns its index and DVR state.
    async fn replace_session(&self, instance_id: Uuid, channel: Channel, muted: bool) -> Result<(usize, DvrState)> {
        let session = match self.open_tile(&channel, muted).await {
            Ok(session) => session,
            Err(e) => {
                let index = self.inner.lock().await.position_of(instance_id);
                warn!("Slot {:?} failed to load {}: {}", index, channel.id, e);
                self.publish_failure(&channel.id, index, &e);
                return Err(e);
            }
        };

        let mut inner = self.inner.lock().await;
        let Some(index) = inner.position_of(instance_id) else {
            drop(inner);
            session.release();
            return Err(Error::InvalidOperation("slot changed while loading".to_string()));
        };

        let mut replacement = self.new_slot(channel, session);
        replacement.dvr = inner.slots[index].dvr.jump_to_live();
        let old = std::mem::replace(&mut inner.slots[index], replacement);
        // Focus may have moved while the session was opening
        if inner.slots[index].is_muted != old.is_muted {
            inner.slots[index].set_muted(old.is_muted);
        }
        let (previous, dvr) = (old.dvr, inner.slots[index].dvr);
        old.release();

        debug!("Slot {} now on {}", index, inner.slots[index].channel.id);
        if dvr != previous {
            self.publish_dvr(index, dvr);
        }
        self.publish_grid(&inner);
        Ok((index, dvr))
    }

    async fn open_tile(&self, channel: &Channel, muted: bool) -> Result<PlaybackSession> {
        let url = self.catalog.stream_url(channel)?;
        PlaybackSession::open(self.engine.as_ref(), channel, &url, SessionOptions::tile(muted)).await
    }

    fn new_slot(&self, channel: Channel, session: PlaybackSession) -> MultiviewSlot {
        let observer = self.spawn_observer(&session);
        MultiviewSlot {
            is_muted: session.is_muted(),
            is_buffering: !session.is_ready(),
            dvr: DvrState::Live,
            channel,
            session,
            observer,
        }
    }

    fn spawn_observer(&self, session: &PlaybackSession) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let state = self.state.clone();
        let instance_id = session.instance_id();

        observe_readiness(session.readiness_events(), move |readiness| {
            let weak = weak.clone();
            let state = state.clone();
            async move { apply_slot_readiness(weak, &state, instance_id, readiness).await }
        })
    }

    fn publish_grid(&self, inner: &GridInner) {
        publish_grid(&self.state, inner);
    }

    fn publish_dvr(&self, index: usize, dvr: DvrState) {
        self.state.broadcast_event(TvmpEvent::SlotDvrChanged {
            index,
            dvr,
            timestamp: chrono::Utc::now(),
        });
    }

    fn publish_failure(&self, channel_id: &ChannelId, slot: Option<usize>, error: &Error) {
        self.state.broadcast_event(TvmpEvent::PlaybackFailed {
            channel_id: channel_id.clone(),
            slot,
            kind: error.failure_kind().unwrap_or(FailureKind::StreamUnavailable),
            message: error.to_string(),
            retryable: error.is_retryable(),
            timestamp: chrono::Utc::now(),
        });
    }
}

fn publish_grid(state: &SharedState, inner: &GridInner) {
    state.broadcast_event(TvmpEvent::MultiviewChanged {
        layout: inner.layout(),
        slots: inner.snapshot(),
        timestamp: chrono::Utc::now(),
    });
}

async fn apply_slot_readiness(
    weak: Weak<Mutex<GridInner>>,
    state: &SharedState,
    instance_id: Uuid,
    readiness: SessionReadiness,
) -> bool {
    let Some(inner) = weak.upgrade() else {
        return false;
    };
    let mut inner = inner.lock().await;
    let Some(index) = inner.position_of(instance_id) else {
        return false;
    };

    let slot = &mut inner.slots[index];
    if !slot.session.set_readiness(readiness.clone()) {
        return true;
    }
    slot.is_buffering = matches!(readiness, SessionReadiness::Loading);

    if let SessionReadiness::Failed { kind, message } = readiness {
        warn!("Slot {} playback failed on {}: {}", index, slot.channel.id, message);
        state.broadcast_event(TvmpEvent::PlaybackFailed {
            channel_id: slot.channel.id.clone(),
            slot: Some(index),
            kind,
            message,
            retryable: true,
            timestamp: chrono::Utc::now(),
        });
    }

    publish_grid(state, &inner);
    true
}
