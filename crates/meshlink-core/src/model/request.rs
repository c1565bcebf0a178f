use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Lifecycle of one named command.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestState {
    #[default]
    Idle,
    Pending,
    Successful,
    Failed,
}

/// Latest known status of a command identifier.
///
/// `error_message` is only ever `Some` while `state` is
/// [`RequestState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub name: String,
    pub state: RequestState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl RequestStatus {
    /// Status of a command that has never been dispatched.
    pub fn idle(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RequestState::Idle,
            error_message: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == RequestState::Pending
    }

    pub fn is_successful(&self) -> bool {
        self.state == RequestState::Successful
    }

    pub fn is_failed(&self) -> bool {
        self.state == RequestState::Failed
    }
}
