// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Events are emitted as structured `tracing` records under the `audit`
//! target, so they can be routed or filtered independently
//! (`RUST_LOG=audit=info`). Secrets never appear in an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Account events
    UserRegistered,
    UserDeleted,

    // Session events
    LoginSucceeded,
    LoginFailed,
    LoggedOut,

    // Key custody events
    KeyStored,
    KeyAccessed,

    // Access control events
    AccessGranted,
    AccessRevoked,
    ProvisioningDispatched,

    // Auth events
    PermissionDenied,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Acting username (if known).
    pub username: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            username: None,
            resource_type: None,
            resource_id: None,
            success: true,
            error: None,
        }
    }

    pub fn with_user(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    /// Write the event to the `audit` target.
    pub fn emit(&self) {
        let event_type = serde_json::to_value(self.event_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();

        if self.success {
            tracing::info!(
                target: "audit",
                event_id = %self.event_id,
                event_type = %event_type,
                username = self.username.as_deref(),
                resource_type = self.resource_type.as_deref(),
                resource_id = self.resource_id.as_deref(),
                "audit event"
            );
        } else {
            tracing::warn!(
                target: "audit",
                event_id = %self.event_id,
                event_type = %event_type,
                username = self.username.as_deref(),
                resource_type = self.resource_type.as_deref(),
                resource_id = self.resource_id.as_deref(),
                error = self.error.as_deref(),
                "audit event"
            );
        }
    }
}

/// Helper macro for logging audit events.
#[macro_export]
macro_rules! audit_log {
    ($event_type:expr, $username:expr) => {{
        $crate::audit::AuditEvent::new($event_type)
            .with_user($username)
            .emit();
    }};
    ($event_type:expr, $username:expr, $resource_type:expr, $resource_id:expr) => {{
        $crate::audit::AuditEvent::new($event_type)
            .with_user($username)
            .with_resource($resource_type, $resource_id)
            .emit();
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::AccessGranted)
            .with_user("root")
            .with_resource("ip_address", "10.0.0.1");

        assert_eq!(event.event_type, AuditEventType::AccessGranted);
        assert_eq!(event.username.as_deref(), Some("root"));
        assert_eq!(event.resource_type.as_deref(), Some("ip_address"));
        assert_eq!(event.resource_id.as_deref(), Some("10.0.0.1"));
        assert!(event.success);
        assert!(event.error.is_none());
    }

    #[test]
    fn failed_event_records_error() {
        let event = AuditEvent::new(AuditEventType::LoginFailed)
            .with_user("mallory")
            .failed("bad credentials");
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("bad credentials"));
        event.emit();
    }

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&AuditEventType::ProvisioningDispatched).unwrap();
        assert_eq!(json, "\"provisioning_dispatched\"");
    }

    #[test]
    fn macro_emits_without_panicking() {
        crate::audit_log!(AuditEventType::KeyStored, "alice", "key_pair", "alice-key");
        crate::audit_log!(AuditEventType::LoggedOut, "alice");
    }
}
