//! Per-slot DVR (time-shift) state machine
//!
//! ```text
//! Live --pause()--> Paused --resume(offset==0)--> Live
//! Live --rewind/ffwd--> TimeShifted(offset)
//! Paused --resume(offset>0)--> TimeShifted(offset)
//! TimeShifted(offset) --pause()--> Paused
//! TimeShifted(offset) --rewind/ffwd--> TimeShifted(offset')
//! any state --jump_to_live()--> Live
//! ```
//!
//! Offsets are whole seconds behind the live edge. `TimeShifted` always
//! carries a non-zero offset: landing on offset 0 normalises to `Live`.
//! Initial state is `Live`; there is no terminal state.

use serde::{Deserialize, Serialize};

/// DVR state of one multiview slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DvrState {
    /// At the live edge
    #[default]
    Live,
    /// Playback halted `offset_secs` behind live
    Paused { offset_secs: u32 },
    /// Playing `offset_secs` behind live
    TimeShifted { offset_secs: u32 },
}

impl DvrState {
    /// Seconds behind live (0 at the live edge)
    pub fn offset_secs(&self) -> u32 {
        match self {
            DvrState::Live => 0,
            DvrState::Paused { offset_secs } | DvrState::TimeShifted { offset_secs } => *offset_secs,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, DvrState::Live)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, DvrState::Paused { .. })
    }

    /// Playing behind live at `offset_secs`, or `Live` for offset 0
    fn playing_at(offset_secs: u32) -> Self {
        if offset_secs == 0 {
            DvrState::Live
        } else {
            DvrState::TimeShifted { offset_secs }
        }
    }

    /// Live/TimeShifted → Paused, remembering the offset. Paused stays put.
    pub fn pause(self) -> Self {
        DvrState::Paused {
            offset_secs: self.offset_secs(),
        }
    }

    /// Paused → TimeShifted(offset) when offset > 0, else Live.
    /// Not paused: unchanged.
    pub fn resume(self) -> Self {
        match self {
            DvrState::Paused { offset_secs } => Self::playing_at(offset_secs),
            other => other,
        }
    }

    /// Move further behind live, capped at `ceiling_secs`
    pub fn rewind(self, seconds: u32, ceiling_secs: u32) -> Self {
        let offset = self.offset_secs().saturating_add(seconds).min(ceiling_secs);
        Self::playing_at(offset)
    }

    /// Move toward live, floored at the live edge
    pub fn fast_forward(self, seconds: u32, ceiling_secs: u32) -> Self {
        let offset = self.offset_secs().saturating_sub(seconds).min(ceiling_secs);
        Self::playing_at(offset)
    }

    pub fn jump_to_live(self) -> Self {
        DvrState::Live
    }

    /// Same variant at a different offset (used to align slots).
    /// Paused stays paused; anything else plays at the new offset.
    pub fn with_offset(self, offset_secs: u32) -> Self {
        match self {
            DvrState::Paused { .. } => DvrState::Paused { offset_secs },
            _ => Self::playing_at(offset_secs),
        }
    }
}
