//! The live joint vector shown in the viewport, and who may write it.

use crate::error::OwnershipError;
use crate::joint::JointVector;

/// A component allowed to drive the joint state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Controller {
    Animator,
    Manipulator,
}

/// Live joint values with a single-writer flag.
///
/// A controller must [`claim`](Self::claim) the state before writing and
/// [`release`](Self::release) it afterwards. Claiming while another
/// controller holds it fails, as does writing without holding it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointState {
    values: JointVector,
    owner: Option<Controller>,
}

impl JointState {
    pub fn new(values: JointVector) -> Self {
        Self {
            values,
            owner: None,
        }
    }

    pub fn values(&self) -> &JointVector {
        &self.values
    }

    pub fn owner(&self) -> Option<Controller> {
        self.owner
    }

    /// Takes write authority. Re-claiming by the current holder is a no-op.
    pub fn claim(&mut self, controller: Controller) -> Result<(), OwnershipError> {
        match self.owner {
            Some(holder) if holder != controller => Err(OwnershipError::Contended {
                holder,
                requested: controller,
            }),
            _ => {
                self.owner = Some(controller);
                Ok(())
            }
        }
    }

    /// Gives up write authority if `controller` holds it.
    pub fn release(&mut self, controller: Controller) {
        if self.owner == Some(controller) {
            self.owner = None;
        }
    }

    pub fn write(&mut self, controller: Controller, values: JointVector) -> Result<(), OwnershipError> {
        if self.owner != Some(controller) {
            return Err(OwnershipError::NotHolder(controller));
        }
        self.values = values;
        Ok(())
    }

    /// Replaces the values and drops any owner. Used when a new script is loaded.
    pub fn reset(&mut self, values: JointVector) {
        self.values = values;
        self.owner = None;
    }
}
