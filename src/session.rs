//! One editing session: the sequence, the live pose and everything that drives it.
//!
//! [`MotionSession`] owns the [`MotionSequence`], the shared [`JointState`]
//! and the three controllers. It enforces the hand-over rules between them:
//!
//! * pressing a handle cancels any running transition and gives the
//!   manipulator exclusive write access until the pointer is released;
//! * releasing does not resume the cancelled transition;
//! * selecting a target while a drag is active is refused.
//!
//! The host calls [`tick`](MotionSession::tick) once per frame and renders the
//! returned [`Frame`].

use crate::animator::SequenceAnimator;
use crate::collision::{CollisionMonitor, CollisionReport};
use crate::config::EditorConfig;
use crate::error::{OwnershipError, ParseError, SequenceError};
use crate::generator::MotionScriptGenerator;
use crate::joint::JointVector;
use crate::manipulator::{ArcDirective, DragKind, HandleDirective, KinematicManipulator, PointerEvent};
use crate::parser::{Diagnostic, MotionScriptParser};
use crate::scene::{RobotScene, ScenePose};
use crate::sequence::{
    BlockField, BlockId, FieldEdit, FieldWarning, MotionBlock, MotionSequence, MoveDirection,
};
use crate::state::{Controller, JointState};
use std::time::Duration;

/// Everything the host needs to draw one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub joints: JointVector,
    pub handles: Vec<HandleDirective>,
    pub arc: ArcDirective,
    pub collisions: CollisionReport,
}

#[derive(Debug)]
pub struct MotionSession {
    parser: MotionScriptParser,
    generator: MotionScriptGenerator,
    scene: RobotScene,
    sequence: MotionSequence,
    state: JointState,
    animator: SequenceAnimator,
    manipulator: KinematicManipulator,
    collisions: CollisionMonitor,
    selected: Option<BlockId>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for MotionSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl MotionSession {
    /// A session on an empty sequence with the built-in humanoid scene.
    pub fn new(config: EditorConfig) -> Self {
        let sequence = MotionSequence::new();
        let mut animator = SequenceAnimator::new(config.animator);
        animator.rest_at(Some(BlockId::Init));
        Self {
            parser: MotionScriptParser::new(config.parser),
            generator: MotionScriptGenerator::default(),
            scene: RobotScene::humanoid(),
            state: JointState::new(sequence.init().positions),
            sequence,
            animator,
            manipulator: KinematicManipulator::new(config.manipulator),
            collisions: CollisionMonitor::new(config.collision),
            selected: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_scene(mut self, scene: RobotScene) -> Self {
        self.scene = scene;
        self.collisions.clear();
        self
    }

    pub fn with_generator(mut self, generator: MotionScriptGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn sequence(&self) -> &MotionSequence {
        &self.sequence
    }

    pub fn joint_values(&self) -> &JointVector {
        self.state.values()
    }

    pub fn joint_state(&self) -> &JointState {
        &self.state
    }

    pub fn animator(&self) -> &SequenceAnimator {
        &self.animator
    }

    pub fn manipulator(&self) -> &KinematicManipulator {
        &self.manipulator
    }

    pub fn scene(&self) -> &RobotScene {
        &self.scene
    }

    /// The block the user last selected; drags write into it.
    pub fn selected_block(&self) -> Option<BlockId> {
        self.selected
    }

    /// Diagnostics from the last [`load_script`](Self::load_script).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Current scene evaluated at the live pose.
    pub fn pose(&self) -> ScenePose {
        self.scene.pose(self.state.values())
    }

    /// Replaces the sequence with the one parsed from `text`.
    ///
    /// On error the session is left untouched. On success the pose returns
    /// to `init`, any drag or transition is dropped and the selection cleared.
    pub fn load_script(&mut self, text: &str) -> Result<&[Diagnostic], ParseError> {
        let parsed = self.parser.parse(text)?;
        self.diagnostics = parsed.diagnostics.clone();
        self.sequence = parsed.into_sequence();

        self.animator.cancel(&mut self.state);
        self.manipulator.reset();
        self.state.reset(self.sequence.init().positions);
        self.animator.rest_at(Some(BlockId::Init));
        self.collisions.clear();
        self.selected = None;

        tracing::info!(
            blocks = self.sequence.user_blocks().len(),
            diagnostics = self.diagnostics.len(),
            "script loaded"
        );
        Ok(&self.diagnostics)
    }

    /// Commits pending field drafts and generates the program text.
    pub fn export_script(&mut self) -> String {
        self.sequence.commit_all_fields();
        self.generator.generate(&self.sequence)
    }

    /// Selects `id` and animates toward it. Returns whether a transition started.
    pub fn select_target(&mut self, id: BlockId) -> Result<bool, OwnershipError> {
        if self.sequence.get(id).is_none() {
            return Ok(false);
        }
        if self.manipulator.is_dragging() {
            return Err(OwnershipError::Contended {
                holder: Controller::Manipulator,
                requested: Controller::Animator,
            });
        }
        self.selected = Some(id);
        self.animator.select_target(id, &self.sequence, &mut self.state)
    }

    pub fn add_block(&mut self) -> BlockId {
        self.sequence.add_block()
    }

    pub fn push_block(&mut self, block: MotionBlock) -> BlockId {
        self.sequence.push_block(block)
    }

    pub fn duplicate_block(&mut self, id: BlockId) -> Result<BlockId, SequenceError> {
        self.sequence.duplicate_block(id)
    }

    pub fn remove_block(&mut self, id: BlockId) -> Result<MotionBlock, SequenceError> {
        let removed = self.sequence.remove_block(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.animator.resting() == Some(id) {
            self.animator.rest_at(None);
        }
        Ok(removed)
    }

    pub fn move_block(&mut self, id: BlockId, direction: MoveDirection) -> Result<(), SequenceError> {
        self.sequence.move_block(id, direction)
    }

    pub fn reorder_block(&mut self, from: usize, to: usize) -> Result<(), SequenceError> {
        self.sequence.reorder(from, to)
    }

    /// See [`MotionSequence::update_block_field`]. A stored pose edit on the
    /// selected block moves the live pose to match.
    pub fn update_block_field(
        &mut self,
        id: BlockId,
        edit: FieldEdit,
    ) -> Result<Option<FieldWarning>, SequenceError> {
        let is_pose = matches!(edit, FieldEdit::Position(..));
        let warning = self.sequence.update_block_field(id, edit)?;
        if is_pose && warning.is_none() {
            self.follow_selected(id);
        }
        Ok(warning)
    }

    /// Focus left a field: stores its draft, clamped.
    pub fn commit_block_field(&mut self, id: BlockId, field: BlockField) -> Result<(), SequenceError> {
        self.sequence.commit_block_field(id, field)?;
        if matches!(field, BlockField::Position(_)) {
            self.follow_selected(id);
        }
        Ok(())
    }

    fn follow_selected(&mut self, id: BlockId) {
        if self.selected == Some(id) && !self.manipulator.is_dragging() {
            // Not dragging, so the animator can always claim the state.
            let _ = self.animator.select_target(id, &self.sequence, &mut self.state);
        }
    }

    /// Starts a drag if the pointer hits a handle or the visible arc.
    pub fn on_pointer_down(&mut self, event: &PointerEvent) -> Result<Option<DragKind>, OwnershipError> {
        let pose = self.pose();
        let Some(kind) = self
            .manipulator
            .pointer_down(event, &pose, self.state.values())
        else {
            return Ok(None);
        };
        self.animator.cancel(&mut self.state);
        self.state.claim(Controller::Manipulator)?;
        Ok(Some(kind))
    }

    /// Applies a drag sample. Returns the new pose if it changed.
    pub fn on_pointer_move(&mut self, event: &PointerEvent) -> Result<Option<JointVector>, OwnershipError> {
        let Some((joint, value)) = self.manipulator.pointer_move(event) else {
            return Ok(None);
        };
        let mut values = *self.state.values();
        if values[joint] == value {
            return Ok(None);
        }
        values[joint] = value;
        self.state.write(Controller::Manipulator, values)?;

        // Sentinel poses are fixed; only the live pose moves for them.
        if let Some(id) = self.selected
            && !id.is_system()
            && let Err(e) = self.sequence.set_positions(id, values)
        {
            tracing::debug!(block = %id, error = %e, "drag not stored in block");
        }
        Ok(Some(values))
    }

    /// Ends the drag and releases the joint state.
    pub fn on_pointer_up(&mut self) -> bool {
        if !self.manipulator.pointer_up() {
            return false;
        }
        self.state.release(Controller::Manipulator);
        let resting = self.selected.filter(|id| !id.is_system());
        self.animator.rest_at(resting);
        true
    }

    /// Advances playback by `dt` and gathers the frame's directives.
    pub fn tick(&mut self, dt: Duration) -> Result<Frame, OwnershipError> {
        self.animator.tick(dt, &self.sequence, &mut self.state)?;
        let pose = self.pose();
        Ok(Frame {
            joints: *self.state.values(),
            handles: self.manipulator.handle_directives(&pose),
            arc: self.manipulator.arc_directive(&pose),
            collisions: self.collisions.update(&pose),
        })
    }
}
