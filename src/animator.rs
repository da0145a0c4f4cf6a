//! Plays the sequence between the resting block and a selected target.
//!
//! The animator walks the contiguous run of blocks from where the pose
//! currently rests to the target, one hop per block, easing each hop with
//! `smoothstep(p^nonlinearity)`. It stores block ids only and re-reads every
//! block on each tick, so edits made mid-transition take effect immediately.

use crate::config::AnimatorConfig;
use crate::error::OwnershipError;
use crate::joint::JointVector;
use crate::sequence::{BlockId, MotionSequence};
use crate::state::{Controller, JointState};
use std::time::Duration;

/// `x²(3 − 2x)`.
pub fn smoothstep(x: f32) -> f32 {
    x * x * (3.0 - 2.0 * x)
}

/// Eased progress for normalized time `p` (clamped to `0..=1`).
pub fn progress(p: f32, nonlinearity: f32) -> f32 {
    smoothstep(p.clamp(0.0, 1.0).powf(nonlinearity))
}

#[derive(Clone, Debug)]
struct Transition {
    path: Vec<BlockId>,
    hop: usize,
    /// Pose at the start of the current hop.
    start: JointVector,
    elapsed: Duration,
}

impl Transition {
    fn target(&self) -> Option<BlockId> {
        self.path.last().copied()
    }
}

#[derive(Clone, Debug)]
enum Phase {
    Idle,
    Transitioning(Transition),
}

/// Idle → Transitioning → Idle state machine over a [`MotionSequence`].
#[derive(Clone, Debug)]
pub struct SequenceAnimator {
    config: AnimatorConfig,
    phase: Phase,
    /// The block whose pose was last reached.
    resting: Option<BlockId>,
}

impl Default for SequenceAnimator {
    fn default() -> Self {
        Self::new(AnimatorConfig::default())
    }
}

impl SequenceAnimator {
    pub fn new(config: AnimatorConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            resting: None,
        }
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.phase, Phase::Transitioning(_))
    }

    pub fn resting(&self) -> Option<BlockId> {
        self.resting
    }

    /// Final block of the running transition.
    pub fn target(&self) -> Option<BlockId> {
        match &self.phase {
            Phase::Transitioning(t) => t.target(),
            Phase::Idle => None,
        }
    }

    /// Block currently being approached.
    pub fn current_hop(&self) -> Option<BlockId> {
        match &self.phase {
            Phase::Transitioning(t) => t.path.get(t.hop).copied(),
            Phase::Idle => None,
        }
    }

    /// Declares the pose to be resting at `id`, e.g. after a new script is loaded.
    pub fn rest_at(&mut self, id: Option<BlockId>) {
        self.resting = id;
    }

    /// Starts (or restarts) a transition toward `target`.
    ///
    /// Returns `false` when there is nothing to do: the target is unknown, or
    /// the animator is idle and already resting on it with the pose unchanged.
    pub fn select_target(
        &mut self,
        target: BlockId,
        sequence: &MotionSequence,
        state: &mut JointState,
    ) -> Result<bool, OwnershipError> {
        let Some(target_index) = sequence.index_of(target) else {
            return Ok(false);
        };

        let from_index = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Transitioning(interrupted) => {
                let from = self.interrupted_endpoint(&interrupted, target_index, sequence);
                tracing::debug!(
                    interrupted = ?interrupted.target(),
                    new_target = %target,
                    "transition cancelled by new target"
                );
                from
            }
            Phase::Idle => {
                let at_target = sequence.blocks()[target_index]
                    .positions
                    .approx_eq(state.values(), self.config.same_pose_epsilon);
                if self.resting == Some(target) && at_target {
                    return Ok(false);
                }
                self.resting_index(sequence, state.values())
            }
        };

        let path: Vec<BlockId> = if from_index <= target_index {
            sequence.blocks()[from_index..=target_index]
                .iter()
                .map(|b| b.id)
                .collect()
        } else {
            sequence.blocks()[target_index..=from_index]
                .iter()
                .rev()
                .map(|b| b.id)
                .collect()
        };

        if let Err(e) = state.claim(Controller::Animator) {
            self.resting = sequence.blocks().get(from_index).map(|b| b.id);
            return Err(e);
        }
        tracing::debug!(target = %target, hops = path.len(), "transition started");
        self.phase = Phase::Transitioning(Transition {
            path,
            hop: 0,
            start: *state.values(),
            elapsed: Duration::ZERO,
        });
        Ok(true)
    }

    /// Stops where the pose is. The next transition starts from the live vector.
    pub fn cancel(&mut self, state: &mut JointState) {
        if let Phase::Transitioning(t) = std::mem::replace(&mut self.phase, Phase::Idle) {
            tracing::debug!(target = ?t.target(), "transition cancelled");
            self.resting = None;
            state.release(Controller::Animator);
        }
    }

    /// Advances the running transition by `dt`.
    pub fn tick(
        &mut self,
        dt: Duration,
        sequence: &MotionSequence,
        state: &mut JointState,
    ) -> Result<(), OwnershipError> {
        let eps = self.config.same_pose_epsilon;
        let mut remaining = dt;

        let Phase::Transitioning(tr) = &mut self.phase else {
            return Ok(());
        };
        while let Some(&id) = tr.path.get(tr.hop) {
            let Some(block) = sequence.get(id) else {
                tracing::debug!(block = %id, "skipping removed block");
                tr.hop += 1;
                tr.elapsed = Duration::ZERO;
                continue;
            };

            if tr.elapsed.is_zero() && tr.start.approx_eq(&block.positions, eps) {
                tr.hop += 1;
                self.resting = Some(id);
                continue;
            }

            tr.elapsed += remaining;
            let duration = block.duration();
            if tr.elapsed >= duration {
                remaining = tr.elapsed - duration;
                state.write(Controller::Animator, block.positions)?;
                tr.start = block.positions;
                tr.elapsed = Duration::ZERO;
                tr.hop += 1;
                self.resting = Some(id);
                tracing::trace!(block = %id, "hop reached");
                continue;
            }

            let p = tr.elapsed.as_secs_f32() / duration.as_secs_f32();
            let s = progress(p, block.nonlinearity);
            state.write(Controller::Animator, tr.start.lerp(&block.positions, s))?;
            return Ok(());
        }

        tracing::debug!(resting = ?self.resting, "transition finished");
        self.phase = Phase::Idle;
        state.release(Controller::Animator);
        Ok(())
    }

    /// Index of the block the idle pose rests on: the recorded resting block,
    /// else the first block matching the live pose, else `init`.
    fn resting_index(&self, sequence: &MotionSequence, live: &JointVector) -> usize {
        self.resting
            .and_then(|id| sequence.index_of(id))
            .or_else(|| {
                sequence
                    .blocks()
                    .iter()
                    .position(|b| b.positions.approx_eq(live, self.config.same_pose_epsilon))
            })
            .unwrap_or(0)
    }

    /// Of the interrupted hop's two endpoints, the one nearer in index to `target_index`.
    fn interrupted_endpoint(
        &self,
        interrupted: &Transition,
        target_index: usize,
        sequence: &MotionSequence,
    ) -> usize {
        let approached = interrupted
            .path
            .get(interrupted.hop)
            .and_then(|&id| sequence.index_of(id));
        let reached = interrupted
            .hop
            .checked_sub(1)
            .and_then(|h| interrupted.path.get(h))
            .and_then(|&id| sequence.index_of(id))
            .or_else(|| self.resting.and_then(|id| sequence.index_of(id)));

        match (reached, approached) {
            (Some(r), Some(a)) => {
                if r.abs_diff(target_index) < a.abs_diff(target_index) {
                    r
                } else {
                    a
                }
            }
            (Some(i), None) | (None, Some(i)) => i,
            (None, None) => 0,
        }
    }
}
