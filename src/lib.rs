//! # motion-forge
//!
//! An engine-agnostic motion-sequence engine for the 9-DOF upper body of a
//! humanoid arm-SDK (four joints per arm plus the waist).
//!
//! It turns the pose tables buried in C++ control programs into an editable
//! [`MotionSequence`], plays that sequence back with eased interpolation,
//! lets a pointer drag single joints through handles in the 3D view, flags
//! self-collisions, and writes the sequence back out as a compilable program.
//! Rendering and UI are left to the host: the crate consumes camera rays and
//! produces [`JointVector`]s plus draw directives.
//!
//! ```
//! use motion_forge::{generate, parse};
//!
//! let source = r#"
//!     float wave[9] = {0.29f, 0, 0, 0.1f, 0.29f, 0, 0, 0.1f, 0};
//!     updateJointPositions(500, wave, current_jpos_des, 1.2f, msg, arm_joints, arm_sdk_publisher);
//! "#;
//! let sequence = parse(source).unwrap();
//! assert_eq!(sequence.user_blocks().len(), 1);
//! assert_eq!(sequence.user_blocks()[0].duration_ms, 500);
//!
//! let program = generate(&sequence);
//! assert_eq!(parse(&program).unwrap().user_blocks().len(), 1);
//! ```

pub mod animator;
pub mod collision;
pub mod config;
pub mod error;
pub mod expr;
pub mod generator;
pub mod joint;
pub mod lexer;
pub mod manipulator;
pub mod parser;
pub mod scene;
pub mod sequence;
pub mod session;
pub mod state;

pub use animator::*;
pub use collision::*;
pub use config::*;
pub use error::*;
pub use generator::*;
pub use joint::*;
pub use manipulator::*;
pub use parser::*;
pub use scene::*;
pub use sequence::*;
pub use session::*;
pub use state::*;
