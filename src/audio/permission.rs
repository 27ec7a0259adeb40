use serde::{Deserialize, Serialize};

/// Microphone permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    NotDetermined,
}

/// Platform microphone-permission API
#[async_trait::async_trait]
pub trait MicrophonePermission: Send + Sync {
    /// Current status without prompting
    async fn check(&self) -> PermissionStatus;

    /// Prompt the user if the platform allows it
    async fn request(&self) -> PermissionStatus;
}

/// Platforms without a capture-permission API
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait::async_trait]
impl MicrophonePermission for AlwaysGranted {
    async fn check(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}

/// Fixed answers for `check` and `request`
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission {
    pub check: PermissionStatus,
    pub request: PermissionStatus,
}

impl StaticPermission {
    pub fn denied() -> Self {
        Self {
            check: PermissionStatus::NotDetermined,
            request: PermissionStatus::Denied,
        }
    }

    /// Not yet determined, granted once requested
    pub fn prompt_grants() -> Self {
        Self {
            check: PermissionStatus::NotDetermined,
            request: PermissionStatus::Granted,
        }
    }
}

#[async_trait::async_trait]
impl MicrophonePermission for StaticPermission {
    async fn check(&self) -> PermissionStatus {
        self.check
    }

    async fn request(&self) -> PermissionStatus {
        self.request
    }
}

/// Permission for the current platform
pub fn platform_permission() -> Box<dyn MicrophonePermission> {
    Box::new(AlwaysGranted)
}

/// Check, then request if needed; true when capture may proceed.
pub async fn ensure_permission(permission: &dyn MicrophonePermission) -> bool {
    if permission.check().await == PermissionStatus::Granted {
        return true;
    }
    permission.request().await == PermissionStatus::Granted
}
