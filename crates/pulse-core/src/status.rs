//! Status enums shared between the pipeline and its collaborators

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection status reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// No usable connection
    None,
    /// Wi-Fi or other local network
    Local,
    /// Mobile data
    Cellular,
    /// Connected through a transport the platform could not classify
    Other,
}

impl ConnectionStatus {
    /// Whether an upload may be attempted
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionStatus::None)
    }
}

/// Observable state of analytics event uploading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Nothing has been logged or uploaded yet
    #[default]
    InitialUnknown,
    /// Events are being cached because the device is offline
    NoConnectivity,
    /// An upload is in progress
    DataUploading,
    /// The last upload completed
    DataUploaded,
    /// The last upload failed; data stays cached
    UploadError,
}

/// Whether the application is visible to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AppIconification {
    /// No lifecycle signal has arrived yet
    #[default]
    Uninitialized,
    Foreground,
    Background,
}

impl fmt::Display for AppIconification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppIconification::Uninitialized => write!(f, "uninitialized"),
            AppIconification::Foreground => write!(f, "foreground"),
            AppIconification::Background => write!(f, "background"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_is_connected() {
        assert!(!ConnectionStatus::None.is_connected());
        assert!(ConnectionStatus::Local.is_connected());
        assert!(ConnectionStatus::Cellular.is_connected());
        assert!(ConnectionStatus::Other.is_connected());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(SyncStatus::default(), SyncStatus::InitialUnknown);
        assert_eq!(AppIconification::default(), AppIconification::Uninitialized);
    }
}
