//! Motion blocks and the sentinel-guarded sequence the editor manipulates.
//!
//! A [`MotionSequence`] always begins with the `init` block and ends with the
//! `shutdown` block. Every mutating method preserves that shape; the only way
//! to build a sequence from raw blocks ([`MotionSequence::from_blocks`], also
//! used by deserialization) validates it.

use crate::error::SequenceError;
use crate::joint::{JointIndex, JointVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Shortest block duration the controller accepts, in milliseconds.
pub const MIN_DURATION_MS: u32 = 100;

/// Accepted range of the nonlinearity exponent.
pub const MIN_NONLINEARITY: f32 = 0.1;
pub const MAX_NONLINEARITY: f32 = 5.0;

/// Defaults for blocks created from the editor.
pub const DEFAULT_DURATION_MS: u32 = 1000;
pub const DEFAULT_NONLINEARITY: f32 = 1.0;

/// Identity of a block within its sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockId {
    Init,
    Shutdown,
    User(u32),
}

impl BlockId {
    pub fn is_system(self) -> bool {
        matches!(self, Self::Init | Self::Shutdown)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Shutdown => f.write_str("shutdown"),
            Self::User(n) => write!(f, "block-{n}"),
        }
    }
}

/// One timed pose of the sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionBlock {
    pub id: BlockId,
    pub name: String,
    /// Target joint values, in radians.
    pub positions: JointVector,
    /// Time to reach `positions` from the previous pose, in milliseconds.
    pub duration_ms: u32,
    /// Exponent applied to normalized time before easing.
    pub nonlinearity: f32,
    pub is_system: bool,
}

impl MotionBlock {
    /// A user block. The id is provisional until the block is inserted into a sequence.
    pub fn new(
        name: impl Into<String>,
        positions: JointVector,
        duration_ms: u32,
        nonlinearity: f32,
    ) -> Self {
        Self {
            id: BlockId::User(0),
            name: name.into(),
            positions,
            duration_ms,
            nonlinearity,
            is_system: false,
        }
    }

    /// The startup sentinel; its pose matches `init_pos` in the generated program.
    pub fn init() -> Self {
        Self {
            id: BlockId::Init,
            name: "Initialization".to_string(),
            positions: JointVector::new([0.29, 0.0, 0.0, 0.1, 0.29, 0.0, 0.0, 0.1, 0.0]),
            duration_ms: 500,
            nonlinearity: 1.2,
            is_system: true,
        }
    }

    /// The closing sentinel; its pose matches `target_pos8` in the generated program.
    pub fn shutdown() -> Self {
        Self {
            id: BlockId::Shutdown,
            name: "Shutdown".to_string(),
            positions: JointVector::new([0.39, 0.0, 0.0, 0.1, 0.39, 0.0, 0.0, 0.1, 0.0]),
            duration_ms: 400,
            nonlinearity: 1.2,
            is_system: true,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.duration_ms))
    }

    /// Raises the duration to the minimum and clamps the nonlinearity into
    /// range. Returns true when anything changed.
    fn clamp_timing(&mut self) -> bool {
        let duration_ms = self.duration_ms.max(MIN_DURATION_MS);
        let nonlinearity = if self.nonlinearity.is_nan() {
            DEFAULT_NONLINEARITY
        } else {
            self.nonlinearity.clamp(MIN_NONLINEARITY, MAX_NONLINEARITY)
        };
        let changed = duration_ms != self.duration_ms || nonlinearity != self.nonlinearity;
        self.duration_ms = duration_ms;
        self.nonlinearity = nonlinearity;
        changed
    }
}

/// An editable field of a [`MotionBlock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockField {
    Name,
    Duration,
    Nonlinearity,
    Position(JointIndex),
}

/// A value typed into a block field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldEdit {
    Name(String),
    Duration(i64),
    Nonlinearity(f32),
    Position(JointIndex, f32),
}

impl FieldEdit {
    pub fn field(&self) -> BlockField {
        match self {
            Self::Name(_) => BlockField::Name,
            Self::Duration(_) => BlockField::Duration,
            Self::Nonlinearity(_) => BlockField::Nonlinearity,
            Self::Position(joint, _) => BlockField::Position(*joint),
        }
    }
}

/// Why an edited value was not stored as typed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldWarning {
    DurationTooShort { value: i64 },
    DurationTooLong { value: i64 },
    NonlinearityOutOfRange { value: f32 },
    PositionOutOfLimit { joint: JointIndex, value: f32 },
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DurationTooShort { value } => {
                write!(f, "duration {value} ms is below the minimum of {MIN_DURATION_MS} ms")
            }
            Self::DurationTooLong { value } => {
                write!(f, "duration {value} ms exceeds the maximum of {} ms", u32::MAX)
            }
            Self::NonlinearityOutOfRange { value } => write!(
                f,
                "nonlinearity {value} is outside {MIN_NONLINEARITY}..={MAX_NONLINEARITY}"
            ),
            Self::PositionOutOfLimit { joint, value } => {
                let lim = joint.limit();
                write!(f, "{joint} = {value} is outside {}..={}", lim.min, lim.max)
            }
        }
    }
}

/// A typed literal that failed validation and is waiting for focus loss.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldDraft {
    pub literal: f64,
    pub warning: FieldWarning,
}

/// Direction for [`MotionSequence::move_block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Ordered blocks framed by the `init` and `shutdown` sentinels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MotionBlock>", into = "Vec<MotionBlock>")]
pub struct MotionSequence {
    blocks: Vec<MotionBlock>,
    next_id: u32,
    drafts: HashMap<(BlockId, BlockField), FieldDraft>,
}

impl Default for MotionSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<MotionBlock>> for MotionSequence {
    type Error = SequenceError;

    fn try_from(blocks: Vec<MotionBlock>) -> Result<Self, Self::Error> {
        Self::from_blocks(blocks)
    }
}

impl From<MotionSequence> for Vec<MotionBlock> {
    fn from(sequence: MotionSequence) -> Self {
        sequence.blocks
    }
}

impl MotionSequence {
    /// Only the two sentinels.
    pub fn new() -> Self {
        Self {
            blocks: vec![MotionBlock::init(), MotionBlock::shutdown()],
            next_id: 1,
            drafts: HashMap::new(),
        }
    }

    /// Default sentinels around `blocks`. System blocks in the input are
    /// dropped and every user block gets a fresh id.
    pub fn with_user_blocks(blocks: impl IntoIterator<Item = MotionBlock>) -> Self {
        let mut sequence = Self::new();
        sequence.replace_user_blocks(blocks);
        sequence
    }

    /// Validates a complete block list, sentinels included.
    pub fn from_blocks(blocks: Vec<MotionBlock>) -> Result<Self, SequenceError> {
        let n = blocks.len();
        let shaped = n >= 2
            && blocks[0].id == BlockId::Init
            && blocks[n - 1].id == BlockId::Shutdown
            && blocks[1..n - 1].iter().all(|b| !b.id.is_system());
        if !shaped {
            return Err(SequenceError::SentinelsMisplaced);
        }

        let mut blocks = blocks;
        blocks[0].is_system = true;
        blocks[n - 1].is_system = true;
        for block in &mut blocks {
            if block.clamp_timing() {
                tracing::debug!(block = %block.id, "timing clamped on load");
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut next_id: u32 = 1;
        for block in &blocks[1..n - 1] {
            if let BlockId::User(k) = block.id {
                let after = k.checked_add(1).ok_or(SequenceError::IdsExhausted)?;
                next_id = next_id.max(after);
            }
        }
        for block in &mut blocks[1..n - 1] {
            block.is_system = false;
            if !seen.insert(block.id) {
                block.id = BlockId::User(next_id);
                next_id = next_id.checked_add(1).ok_or(SequenceError::IdsExhausted)?;
            }
        }

        Ok(Self {
            blocks,
            next_id,
            drafts: HashMap::new(),
        })
    }

    pub fn blocks(&self) -> &[MotionBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Never true: the sentinels are always present.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn init(&self) -> &MotionBlock {
        &self.blocks[0]
    }

    pub fn shutdown(&self) -> &MotionBlock {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Blocks between the sentinels, in order.
    pub fn user_blocks(&self) -> &[MotionBlock] {
        &self.blocks[1..self.blocks.len() - 1]
    }

    pub fn get(&self, id: BlockId) -> Option<&MotionBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// True when the sentinel shape holds. Every method keeps it true.
    pub fn is_well_formed(&self) -> bool {
        let n = self.blocks.len();
        n >= 2
            && self.blocks[0].id == BlockId::Init
            && self.blocks[n - 1].id == BlockId::Shutdown
            && self.blocks[1..n - 1].iter().all(|b| !b.id.is_system())
    }

    fn get_mut(&mut self, id: BlockId) -> Result<&mut MotionBlock, SequenceError> {
        self.blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(SequenceError::UnknownBlock(id))
    }

    /// Hands out the next user id. Once `u32::MAX` is reached the ids still in
    /// use are renumbered densely from 1.
    fn allocate_id(&mut self) -> BlockId {
        if self.next_id == u32::MAX {
            self.renumber();
        }
        let id = BlockId::User(self.next_id);
        self.next_id += 1;
        id
    }

    fn renumber(&mut self) {
        let n = self.blocks.len();
        let mut mapping = HashMap::new();
        for (k, block) in (1u32..).zip(&mut self.blocks[1..n - 1]) {
            mapping.insert(block.id, BlockId::User(k));
            block.id = BlockId::User(k);
        }
        self.drafts = std::mem::take(&mut self.drafts)
            .into_iter()
            .map(|((id, field), draft)| ((mapping.get(&id).copied().unwrap_or(id), field), draft))
            .collect();
        self.next_id = n as u32 - 1;
        tracing::debug!(next_id = self.next_id, "user block ids renumbered");
    }

    fn insert_before_shutdown(&mut self, mut block: MotionBlock) -> BlockId {
        let id = self.allocate_id();
        if block.clamp_timing() {
            tracing::debug!(block = %id, name = %block.name, "timing clamped on insert");
        }
        block.id = id;
        block.is_system = false;
        let at = self.blocks.len() - 1;
        self.blocks.insert(at, block);
        id
    }

    /// Name for the next editor-created block: one past the highest `Motion N`.
    fn next_motion_name(&self) -> String {
        let highest = self
            .user_blocks()
            .iter()
            .filter_map(|b| b.name.strip_prefix("Motion ")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("Motion {}", highest + 1)
    }

    /// Appends a zero-pose block before `shutdown`.
    pub fn add_block(&mut self) -> BlockId {
        let block = MotionBlock::new(
            self.next_motion_name(),
            JointVector::ZERO,
            DEFAULT_DURATION_MS,
            DEFAULT_NONLINEARITY,
        );
        self.insert_before_shutdown(block)
    }

    /// Appends `block` before `shutdown` under a fresh id, with its duration,
    /// nonlinearity and pose clamped into range.
    pub fn push_block(&mut self, mut block: MotionBlock) -> BlockId {
        let clamped = block.positions.clamped();
        if clamped != block.positions {
            tracing::debug!(name = %block.name, "pose clamped to joint limits");
            block.positions = clamped;
        }
        self.insert_before_shutdown(block)
    }

    /// Copies a user block to just before `shutdown`.
    pub fn duplicate_block(&mut self, id: BlockId) -> Result<BlockId, SequenceError> {
        let source = self.get(id).ok_or(SequenceError::UnknownBlock(id))?;
        if source.is_system {
            return Err(SequenceError::SystemBlock(id));
        }
        let mut copy = source.clone();
        copy.name = format!("{} (copy)", copy.name);
        Ok(self.insert_before_shutdown(copy))
    }

    pub fn remove_block(&mut self, id: BlockId) -> Result<MotionBlock, SequenceError> {
        if id.is_system() {
            return Err(SequenceError::SystemBlock(id));
        }
        let index = self.index_of(id).ok_or(SequenceError::UnknownBlock(id))?;
        self.drafts.retain(|(block, _), _| *block != id);
        Ok(self.blocks.remove(index))
    }

    /// Moves a user block one slot, never past a sentinel.
    pub fn move_block(&mut self, id: BlockId, direction: MoveDirection) -> Result<(), SequenceError> {
        if id.is_system() {
            return Err(SequenceError::SystemBlock(id));
        }
        let from = self.index_of(id).ok_or(SequenceError::UnknownBlock(id))?;
        let to = match direction {
            MoveDirection::Up => from.wrapping_sub(1),
            MoveDirection::Down => from + 1,
        };
        self.reorder(from, to)
    }

    /// Moves the block at `from` to `to`. Both must lie strictly between the sentinels.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), SequenceError> {
        let last = self.blocks.len() - 2;
        for index in [from, to] {
            if index == 0 || index > last {
                return Err(SequenceError::OutOfRange { index, last });
            }
        }
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        Ok(())
    }

    /// Drops every user block and inserts `blocks` under fresh ids.
    pub fn replace_user_blocks(&mut self, blocks: impl IntoIterator<Item = MotionBlock>) {
        let n = self.blocks.len();
        self.blocks.drain(1..n - 1);
        self.drafts.retain(|(id, _), _| id.is_system());
        for block in blocks {
            if !block.id.is_system() && !block.is_system {
                self.insert_before_shutdown(block);
            }
        }
    }

    /// Overwrites a user block's pose. Used by direct manipulation, which clamps already.
    pub fn set_positions(&mut self, id: BlockId, positions: JointVector) -> Result<(), SequenceError> {
        if id.is_system() {
            return Err(SequenceError::SystemBlock(id));
        }
        self.get_mut(id)?.positions = positions;
        for joint in JointIndex::ALL {
            self.drafts.remove(&(id, BlockField::Position(joint)));
        }
        Ok(())
    }

    /// Sets the duration of a sentinel, the one field sentinels expose.
    pub fn set_sentinel_duration(&mut self, id: BlockId, duration_ms: u32) {
        debug_assert!(id.is_system());
        if let Ok(block) = self.get_mut(id) {
            block.duration_ms = duration_ms.max(MIN_DURATION_MS);
        }
    }

    /// Applies a typed value to a block field.
    ///
    /// A valid value is stored at once. An invalid one is kept as a draft and
    /// reported; the block keeps its previous value until
    /// [`commit_block_field`](Self::commit_block_field) stores the clamped literal.
    pub fn update_block_field(
        &mut self,
        id: BlockId,
        edit: FieldEdit,
    ) -> Result<Option<FieldWarning>, SequenceError> {
        let field = edit.field();
        let block = self.get_mut(id)?;
        if block.is_system && field != BlockField::Duration {
            return Err(SequenceError::SystemBlock(id));
        }

        let (literal, warning) = match edit {
            FieldEdit::Name(name) => {
                block.name = name;
                return Ok(None);
            }
            FieldEdit::Duration(value) => {
                if value < i64::from(MIN_DURATION_MS) {
                    (value as f64, Some(FieldWarning::DurationTooShort { value }))
                } else if value > i64::from(u32::MAX) {
                    (value as f64, Some(FieldWarning::DurationTooLong { value }))
                } else {
                    block.duration_ms = value as u32;
                    (value as f64, None)
                }
            }
            FieldEdit::Nonlinearity(value) => {
                if (MIN_NONLINEARITY..=MAX_NONLINEARITY).contains(&value) {
                    block.nonlinearity = value;
                    (f64::from(value), None)
                } else {
                    (
                        f64::from(value),
                        Some(FieldWarning::NonlinearityOutOfRange { value }),
                    )
                }
            }
            FieldEdit::Position(joint, value) => {
                if joint.limit().contains(value) {
                    block.positions[joint] = value;
                    (f64::from(value), None)
                } else {
                    (
                        f64::from(value),
                        Some(FieldWarning::PositionOutOfLimit { joint, value }),
                    )
                }
            }
        };

        match warning {
            Some(warning) => {
                tracing::debug!(block = %id, %warning, "field edit held as draft");
                self.drafts.insert((id, field), FieldDraft { literal, warning });
            }
            None => {
                self.drafts.remove(&(id, field));
            }
        }
        Ok(warning)
    }

    /// The pending literal for a field, if its last edit was invalid.
    pub fn draft(&self, id: BlockId, field: BlockField) -> Option<&FieldDraft> {
        self.drafts.get(&(id, field))
    }

    pub fn has_drafts(&self) -> bool {
        !self.drafts.is_empty()
    }

    /// Focus left the field: store the draft, clamped into range.
    pub fn commit_block_field(&mut self, id: BlockId, field: BlockField) -> Result<(), SequenceError> {
        let Some(draft) = self.drafts.remove(&(id, field)) else {
            return Ok(());
        };
        let block = self.get_mut(id)?;
        let literal = draft.literal;
        match field {
            BlockField::Name => {}
            BlockField::Duration => {
                block.duration_ms = literal.clamp(f64::from(MIN_DURATION_MS), f64::from(u32::MAX)) as u32;
            }
            BlockField::Nonlinearity => {
                block.nonlinearity = if literal.is_nan() {
                    DEFAULT_NONLINEARITY
                } else {
                    (literal as f32).clamp(MIN_NONLINEARITY, MAX_NONLINEARITY)
                };
            }
            BlockField::Position(joint) => {
                let value = if literal.is_nan() { 0.0 } else { literal as f32 };
                block.positions[joint] = joint.limit().clamp(value);
            }
        }
        Ok(())
    }

    /// Commits every pending draft.
    pub fn commit_all_fields(&mut self) {
        let pending: Vec<_> = self.drafts.keys().copied().collect();
        for (id, field) in pending {
            // Drafts only exist for blocks that are still present.
            let _ = self.commit_block_field(id, field);
        }
    }
}
