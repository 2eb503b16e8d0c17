// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-user sets of authorized IP addresses.
//!
//! A grant succeeds only when none of the requested addresses is already
//! granted; a revoke of an address that is not granted is a no-op. A user
//! without an access record has no access.

use std::collections::BTreeSet;
use std::net::IpAddr;

use crate::audit::AuditEventType;
use crate::audit_log;
use crate::error::{ServiceError, ServiceResult};
use crate::storage::{CredentialStore, StorageError};

/// A user deleted between the existence check and the update is "not found".
fn access_error(err: StorageError) -> ServiceError {
    match err {
        StorageError::NotFound(_) => ServiceError::not_found("User not found"),
        other => other.into(),
    }
}

/// Parse a non-empty list of textual IP addresses.
pub fn parse_ips<S: AsRef<str>>(ips: &[S]) -> ServiceResult<BTreeSet<IpAddr>> {
    if ips.is_empty() {
        return Err(ServiceError::MalformedRequest);
    }
    ips.iter()
        .map(|ip| ip.as_ref().trim().parse::<IpAddr>())
        .collect::<Result<_, _>>()
        .map_err(|_| ServiceError::MalformedRequest)
}

pub struct AccessControlService<'a> {
    store: &'a dyn CredentialStore,
}

impl<'a> AccessControlService<'a> {
    pub fn new(store: &'a dyn CredentialStore) -> Self {
        Self { store }
    }

    fn require_user(&self, username: &str) -> ServiceResult<()> {
        match self.store.find_user_by_username(username)? {
            Some(_) => Ok(()),
            None => Err(ServiceError::not_found("User not found")),
        }
    }

    /// Grant every address in `ips`, returning them in sorted order.
    ///
    /// The overlap check and the write are one storage operation, so
    /// concurrent grants to the same user are all kept.
    pub fn grant<S: AsRef<str>>(&self, username: &str, ips: &[S]) -> ServiceResult<Vec<IpAddr>> {
        self.require_user(username)?;
        let requested = parse_ips(ips)?;

        self.store
            .grant_ips(username, &requested)
            .map_err(|err| match err {
                StorageError::AlreadyExists(_) => ServiceError::conflict("Access already granted"),
                other => access_error(other),
            })?;

        for ip in &requested {
            audit_log!(AuditEventType::AccessGranted, username, "ip_address", ip.to_string());
        }
        Ok(requested.into_iter().collect())
    }

    /// Remove the given addresses; returns the ones that were granted.
    pub fn revoke<S: AsRef<str>>(&self, username: &str, ips: &[S]) -> ServiceResult<Vec<IpAddr>> {
        self.require_user(username)?;
        let requested = parse_ips(ips)?;

        let removed = self
            .store
            .revoke_ips(username, &requested)
            .map_err(access_error)?;

        for ip in &removed {
            audit_log!(AuditEventType::AccessRevoked, username, "ip_address", ip.to_string());
        }
        Ok(removed)
    }

    /// Clear the user's set; returns how many addresses were removed.
    pub fn revoke_all(&self, username: &str) -> ServiceResult<usize> {
        self.require_user(username)?;

        let removed = self.store.clear_ips(username).map_err(access_error)?;
        if removed > 0 {
            audit_log!(AuditEventType::AccessRevoked, username, "ip_address", "*");
        }
        Ok(removed)
    }

    pub fn has_access(&self, username: &str, ip: &str) -> ServiceResult<bool> {
        self.require_user(username)?;
        let ip: IpAddr = ip.trim().parse().map_err(|_| ServiceError::MalformedRequest)?;

        Ok(self
            .store
            .find_access_control(username)?
            .is_some_and(|record| record.ip_addresses.contains(&ip)))
    }

    /// Granted addresses in sorted order; empty when no record exists.
    pub fn get_all_ips(&self, username: &str) -> ServiceResult<Vec<IpAddr>> {
        Ok(self
            .store
            .find_access_control(username)?
            .map(|record| record.ip_addresses.into_iter().collect())
            .unwrap_or_default())
    }
}
