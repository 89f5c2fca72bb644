//! Circular channel adjacency
//!
//! Previous/next are computed with modulo arithmetic over the ordered
//! channel list: `(index + delta + count) % count`.

use tvmp_common::{Channel, ChannelId};

/// Index `delta` steps away from `index`, wrapping in both directions
pub fn wrap_index(index: usize, delta: isize, count: usize) -> usize {
    debug_assert!(count > 0);
    let count = count as isize;
    ((index as isize + delta % count + count) % count) as usize
}

/// Position of `channel` in `ordered`
pub fn position_of(channel: &ChannelId, ordered: &[Channel]) -> Option<usize> {
    ordered.iter().position(|c| &c.id == channel)
}

/// Channel `delta` steps from `current` (circular)
pub fn step(current: &ChannelId, delta: isize, ordered: &[Channel]) -> Option<Channel> {
    let index = position_of(current, ordered)?;
    Some(ordered[wrap_index(index, delta, ordered.len())].clone())
}

/// Previous and next channels around `current`
///
/// Neither side is ever `current` itself, and with two channels the single
/// neighbour is returned once. Returns an empty list when `current` is not
/// in `ordered` or has no neighbours.
pub fn neighbours(current: &ChannelId, ordered: &[Channel]) -> Vec<Channel> {
    let Some(index) = position_of(current, ordered) else {
        return Vec::new();
    };

    let count = ordered.len();
    let mut result: Vec<Channel> = Vec::with_capacity(2);
    for delta in [-1, 1] {
        let candidate = &ordered[wrap_index(index, delta, count)];
        if &candidate.id != current && !result.iter().any(|c| c.id == candidate.id) {
            result.push(candidate.clone());
        }
    }
    result
}
