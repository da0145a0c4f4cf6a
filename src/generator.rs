//! Turns a [`MotionSequence`] back into a compilable control program.
//!
//! The output is the template text with four placeholders filled in:
//!
//! * `{{INIT_DURATION}}` / `{{SHUTDOWN_DURATION}}`: sentinel durations in ms,
//! * `{{MOTIONS}}`: one pose-update call per user block, each followed by a
//!   `// name` comment that the parser reads back as the block name,
//! * `{{VERSION}}` (optional): the build stamp.

use crate::error::TemplateError;
use crate::joint::JointVector;
use crate::sequence::{MotionBlock, MotionSequence};

const INIT_DURATION: &str = "{{INIT_DURATION}}";
const SHUTDOWN_DURATION: &str = "{{SHUTDOWN_DURATION}}";
const MOTIONS: &str = "{{MOTIONS}}";
const VERSION: &str = "{{VERSION}}";

/// Build stamp written when none is given.
pub const DEFAULT_VERSION: u32 = 1291;

const ARM_SDK_TEMPLATE: &str = include_str!("../templates/unitree_arm_sdk.cpp");

/// Boilerplate program text with placeholders for the sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptTemplate {
    text: String,
}

impl Default for ScriptTemplate {
    /// The Unitree arm-SDK program.
    fn default() -> Self {
        Self {
            text: ARM_SDK_TEMPLATE.to_string(),
        }
    }
}

impl ScriptTemplate {
    /// Checks that `text` carries every required placeholder.
    pub fn new(text: impl Into<String>) -> Result<Self, TemplateError> {
        let text = text.into();
        for placeholder in [INIT_DURATION, MOTIONS, SHUTDOWN_DURATION] {
            if !text.contains(placeholder) {
                return Err(TemplateError::MissingPlaceholder(placeholder));
            }
        }
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// `HHMM` build stamp, as written into `version_debug`.
pub fn version_stamp(hour: u32, minute: u32) -> u32 {
    hour * 100 + minute
}

/// Generates with the built-in template and the default stamp.
pub fn generate(sequence: &MotionSequence) -> String {
    MotionScriptGenerator::default().generate(sequence)
}

#[derive(Clone, Debug, Default)]
pub struct MotionScriptGenerator {
    template: ScriptTemplate,
    version: Option<u32>,
}

impl MotionScriptGenerator {
    pub fn new(template: ScriptTemplate) -> Self {
        Self {
            template,
            version: None,
        }
    }

    /// Stamps `version` into the `{{VERSION}}` placeholder.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// # Panics
    ///
    /// If `sequence` is not framed by its sentinels. Every public
    /// [`MotionSequence`] operation keeps that shape, so this only fires on a bug.
    pub fn generate(&self, sequence: &MotionSequence) -> String {
        assert!(
            sequence.is_well_formed(),
            "generate() requires init and shutdown sentinels around the user blocks"
        );

        let motions = sequence
            .user_blocks()
            .iter()
            .map(motion_line)
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(blocks = sequence.user_blocks().len(), "generated motion script");

        self.template
            .as_str()
            .replace(VERSION, &self.version.unwrap_or(DEFAULT_VERSION).to_string())
            .replace(INIT_DURATION, &sequence.init().duration_ms.to_string())
            .replace(SHUTDOWN_DURATION, &sequence.shutdown().duration_ms.to_string())
            .replace(MOTIONS, &motions)
    }
}

fn motion_line(block: &MotionBlock) -> String {
    // A newline in the name would end the comment early.
    let name = block.name.replace(['\r', '\n'], " ");
    format!(
        "        updateJointPositions({}, {{{}}}, current_jpos_des, {}, msg, arm_joints, arm_sdk_publisher); // {}",
        block.duration_ms,
        format_positions(&block.positions),
        format_nonlinearity(block.nonlinearity),
        name.trim(),
    )
}

/// Integers bare, everything else with an `f` suffix.
fn format_positions(positions: &JointVector) -> String {
    positions
        .as_array()
        .iter()
        .map(|&v| {
            if v.fract() == 0.0 {
                format!("{v}")
            } else {
                format!("{v}f")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Always a float literal: `1.0f`, `1.2f`.
fn format_nonlinearity(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}f")
    } else {
        format!("{value}f")
    }
}
