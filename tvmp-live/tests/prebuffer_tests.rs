//! Integration tests for adjacent-channel pre-buffering
//!
//! Covers the buffer manager on its own and through the live controller:
//! - neighbours only, never the current channel, stale entries evicted
//! - last call wins: a superseded preload never writes
//! - promote hands over the buffered session itself, once

mod helpers;

use helpers::{channel_url, wait_for, Harness};
use std::time::Duration;
use tvmp_common::events::{SessionReadiness, TvmpEvent};
use tvmp_common::ChannelId;
use tvmp_live::engine::SimulatedEngine;

#[tokio::test]
async fn test_end_to_end_promote_and_shift() {
    let h = Harness::new(&["a", "b", "c", "d"]);
    let ordered = h.ordered();

    h.buffer.preload_adjacent(&ChannelId::new("b"), &ordered).await;
    assert!(h.wait_for_buffered(&["a", "c"]).await);
    assert!(h.wait_until_ready("c").await);

    let buffered_c = h.buffer.get_ready(&ChannelId::new("c")).await.unwrap();
    let promoted = h.buffer.promote(&ChannelId::new("c")).await.unwrap();
    assert_eq!(promoted.instance_id(), buffered_c.session_id);
    assert_eq!(h.engine.handles_for(&channel_url("c")).len(), 1);

    h.buffer.preload_adjacent(&ChannelId::new("c"), &ordered).await;
    // A is evicted immediately, before any new load starts
    assert!(!h.buffer.is_buffered(&ChannelId::new("a")).await);
    assert!(h.wait_for_buffered(&["b", "d"]).await);
    assert_eq!(h.engine.handles_for(&channel_url("a"))[0].destroy_count(), 1);

    // The promoted session is still alive and owned by the caller
    assert!(!h.engine.handles_for(&channel_url("c"))[0].is_destroyed());
    promoted.release();
    assert_eq!(h.engine.handles_for(&channel_url("c"))[0].destroy_count(), 1);
}

#[tokio::test]
async fn test_never_buffers_current_for_any_position() {
    let ids = ["a", "b", "c", "d", "e"];
    let h = Harness::new(&ids);
    let ordered = h.ordered();

    for (i, id) in ids.iter().enumerate() {
        let prev = ids[(i + ids.len() - 1) % ids.len()];
        let next = ids[(i + 1) % ids.len()];
        let mut expected = vec![prev, next];
        expected.sort();

        h.buffer.preload_adjacent(&ChannelId::new(*id), &ordered).await;
        assert!(
            h.wait_for_buffered(&expected).await,
            "around {}: buffered {:?}, expected {:?}",
            id,
            h.buffered().await,
            expected
        );
        assert!(!h.buffer.is_buffered(&ChannelId::new(*id)).await);
    }
}

#[tokio::test]
async fn test_small_lists() {
    let single = Harness::new(&["solo"]);
    single.buffer.preload_adjacent(&ChannelId::new("solo"), &single.ordered()).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(single.buffered().await.is_empty());
    assert_eq!(single.engine.created_count(), 0);

    let pair = Harness::new(&["a", "b"]);
    pair.buffer.preload_adjacent(&ChannelId::new("a"), &pair.ordered()).await;
    assert!(pair.wait_for_buffered(&["b"]).await);
    assert_eq!(pair.engine.handles_for(&channel_url("b")).len(), 1);
}

#[tokio::test]
async fn test_superseded_preload_never_writes() {
    let h = Harness::builder(&["a", "b", "c", "d"])
        .engine(SimulatedEngine::manual().with_history().with_create_delay(Duration::from_millis(40)))
        .build();
    let ordered = h.ordered();
    let mut rx = h.state.subscribe_events();

    h.buffer.preload_adjacent(&ChannelId::new("b"), &ordered).await;
    // First task is now inside the engine's create for A
    tokio::time::sleep(Duration::from_millis(15)).await;
    h.buffer.preload_adjacent(&ChannelId::new("c"), &ordered).await;

    assert!(h.wait_for_buffered(&["b", "d"]).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.buffered().await, vec!["b", "d"]);

    // Nothing for A was ever published as buffered
    while let Ok(event) = rx.try_recv() {
        if let TvmpEvent::BufferReadinessChanged { buffered, .. } = event {
            assert!(!buffered.contains(&ChannelId::new("a")), "stale write: {:?}", buffered);
        }
    }
    // And anything the first task did open was released
    assert!(h.engine.handles_for(&channel_url("a")).iter().all(|handle| handle.is_destroyed()));
}

#[tokio::test]
async fn test_late_readiness_for_evicted_session_is_ignored() {
    let h = Harness::builder(&["a", "b", "c", "d"])
        .engine(SimulatedEngine::manual().with_history())
        .build();
    let ordered = h.ordered();

    h.buffer.preload_adjacent(&ChannelId::new("b"), &ordered).await;
    assert!(h.wait_for_buffered(&["a", "c"]).await);
    let stale = h.engine.handles_for(&channel_url("a")).pop().unwrap();

    h.buffer.preload_adjacent(&ChannelId::new("c"), &ordered).await;
    stale.signal(SessionReadiness::Ready);

    assert!(h.wait_for_buffered(&["b", "d"]).await);
    assert!(h.buffer.get_ready(&ChannelId::new("a")).await.is_none());
    assert!(h.buffer.promote(&ChannelId::new("a")).await.is_none());
}

#[tokio::test]
async fn test_rapid_tunes_settle_on_last_channel() {
    let h = Harness::builder(&["a", "b", "c", "d", "e", "f"])
        .settle_delay_ms(60)
        .build();

    for id in ["a", "b", "c", "d"] {
        h.controller.tune(&ChannelId::new(id)).await.unwrap();
    }

    assert!(h.wait_for_buffered(&["c", "e"]).await);
    assert_eq!(h.controller.current_channel().await.unwrap().id.as_str(), "d");

    // Only the last adjacency set was ever loaded in the background
    let background: Vec<String> = h
        .engine
        .handles()
        .iter()
        .filter(|handle| handle.options.low_buffer)
        .map(|handle| handle.url.clone())
        .collect();
    assert_eq!(background.len(), 2);
}

#[tokio::test]
async fn test_instant_start_through_controller() {
    let h = Harness::new(&["a", "b", "c", "d"]);

    let first = h.controller.tune(&ChannelId::new("b")).await.unwrap();
    assert!(!first.instant_start);
    assert!(h.wait_until_ready("c").await);

    let created_before = h.engine.created_count();
    let second = h.controller.tune(&ChannelId::new("c")).await.unwrap();
    assert!(second.instant_start);

    // No foreground session was created for C
    assert_eq!(h.engine.handles_for(&channel_url("c")).len(), 1);
    assert!(!h.buffer.is_buffered(&ChannelId::new("c")).await);

    assert!(h.wait_for_buffered(&["b", "d"]).await);
    // Only the new neighbours were opened since the switch
    assert!(h.engine.created_count() <= created_before + 2);
}

#[tokio::test]
async fn test_background_failure_stays_invisible() {
    let engine = SimulatedEngine::new(Duration::from_millis(1)).with_history();
    engine.mark_undecodable(&channel_url("c"));
    let h = Harness::builder(&["a", "b", "c"]).engine(engine).build();
    let mut rx = h.state.subscribe_events();

    h.controller.tune(&ChannelId::new("b")).await.unwrap();
    let state = &h.state;
    assert!(wait_for(Duration::from_secs(2), move || async move { state.absorbed_prebuffer_failures() == 1 }).await);

    // No PlaybackFailed for a background session; foreground unaffected
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, TvmpEvent::PlaybackFailed { .. }), "unexpected {:?}", event);
    }
    assert!(h.controller.last_error().await.is_none());

    // Tuning to C opens a fresh foreground session instead of promoting
    let outcome = h.controller.tune(&ChannelId::new("c")).await.unwrap();
    assert!(!outcome.instant_start);
    assert_eq!(h.engine.handles_for(&channel_url("c")).len(), 2);
}

#[tokio::test]
async fn test_favorites_only_ordering() {
    let h = Harness::builder(&["a", "b", "c", "d", "e"]).favorites_only().build();
    for id in ["a", "c", "e"] {
        h.catalog.set_favorite(&ChannelId::new(id), true);
    }

    h.controller.tune(&ChannelId::new("c")).await.unwrap();
    assert!(h.wait_for_buffered(&["a", "e"]).await);

    // Not a favorite: fall back to the full guide
    h.controller.tune(&ChannelId::new("b")).await.unwrap();
    assert!(h.wait_for_buffered(&["a", "c"]).await);
}

#[tokio::test]
async fn test_engine_records_stay_bounded_over_many_tunes() {
    let h = Harness::builder(&["a", "b", "c", "d"])
        .engine(SimulatedEngine::new(Duration::from_millis(1)))
        .build();

    for n in 0..200 {
        let id = ["a", "b", "c", "d"][n % 4];
        h.controller.tune(&ChannelId::new(id)).await.unwrap();
        // Foreground and neighbours, plus aborted loads not yet dropped
        assert!(h.engine.retained_count() <= 6, "tune {}: {} records", n, h.engine.retained_count());
    }
    assert!(h.engine.created_count() >= 200);

    h.controller.shutdown().await;
    let engine = &h.engine;
    assert!(wait_for(Duration::from_secs(2), move || async move { engine.retained_count() == 0 }).await);
}
