use foundation::RegistrationId;
use providers::{MutatorError, NormalizeError};

use crate::cascade::CascadeError;

#[derive(Debug)]
pub enum ControlError {
    UnknownRegistration(RegistrationId),
    /// The registration is still pending or failed to normalize.
    NotReady(RegistrationId),
    Normalize {
        registration: RegistrationId,
        source: NormalizeError,
    },
    Cascade(CascadeError),
    Mutator(MutatorError),
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::UnknownRegistration(id) => write!(f, "unknown registration {id}"),
            ControlError::NotReady(id) => write!(f, "registration {id} has no resolved tree"),
            ControlError::Normalize {
                registration,
                source,
            } => write!(f, "{registration}: {source}"),
            ControlError::Cascade(e) => write!(f, "{e}"),
            ControlError::Mutator(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControlError::Normalize { source, .. } => Some(source),
            ControlError::Cascade(e) => Some(e),
            ControlError::Mutator(e) => Some(e),
            ControlError::UnknownRegistration(_) | ControlError::NotReady(_) => None,
        }
    }
}

impl From<CascadeError> for ControlError {
    fn from(value: CascadeError) -> Self {
        ControlError::Cascade(value)
    }
}

impl From<MutatorError> for ControlError {
    fn from(value: MutatorError) -> Self {
        ControlError::Mutator(value)
    }
}
