// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding `custody.redb` | unset (in-memory store) |
//! | `PROVISION_DIR` | Output directory of the provisioning worker | `./provisioning` |
//! | `TRANSPORT_KEY_BITS` | RSA transport key size | `4096` |
//! | `TRANSPORT_KEY_TTL_SECS` | Transport key expiry window | `3600` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! Unparseable numeric values fall back to their defaults with a warning.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::TimeDelta;

use crate::crypto::transport_key::{TRANSPORT_KEY_BITS, TRANSPORT_KEY_TTL_SECS};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Without it the server runs on the in-memory store and loses all state on
/// restart.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const PROVISION_DIR_ENV: &str = "PROVISION_DIR";
pub const TRANSPORT_KEY_BITS_ENV: &str = "TRANSPORT_KEY_BITS";
pub const TRANSPORT_KEY_TTL_ENV: &str = "TRANSPORT_KEY_TTL_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default `RUST_LOG` filter when the variable is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// File name of the redb database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "custody.redb";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_PROVISION_DIR: &str = "./provisioning";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// Read only `LOG_FORMAT`, so tracing can be initialized before the rest
    /// of the configuration is parsed and warned about.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup(LOG_FORMAT_ENV).map(|v| v.trim().to_ascii_lowercase()) {
            Some(format) if format == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub provision_dir: PathBuf,
    pub transport_key_bits: usize,
    pub transport_key_ttl: TimeDelta,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: None,
            provision_dir: PathBuf::from(DEFAULT_PROVISION_DIR),
            transport_key_bits: TRANSPORT_KEY_BITS,
            transport_key_ttl: TimeDelta::seconds(TRANSPORT_KEY_TTL_SECS),
            log_format: LogFormat::Pretty,
        }
    }
}

fn parse_or_default<T: std::str::FromStr + Copy + std::fmt::Display>(
    name: &str,
    raw: Option<String>,
    default: T,
) -> T {
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = %value, default = %default, "Invalid value, using default");
            default
        }),
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let ttl_secs = parse_or_default(
            TRANSPORT_KEY_TTL_ENV,
            non_empty(TRANSPORT_KEY_TTL_ENV),
            TRANSPORT_KEY_TTL_SECS,
        );

        Self {
            host: non_empty(HOST_ENV).unwrap_or(defaults.host),
            port: parse_or_default(PORT_ENV, non_empty(PORT_ENV), defaults.port),
            data_dir: non_empty(DATA_DIR_ENV).map(PathBuf::from),
            provision_dir: non_empty(PROVISION_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.provision_dir),
            transport_key_bits: parse_or_default(
                TRANSPORT_KEY_BITS_ENV,
                non_empty(TRANSPORT_KEY_BITS_ENV),
                defaults.transport_key_bits,
            ),
            transport_key_ttl: TimeDelta::try_seconds(ttl_secs).unwrap_or(defaults.transport_key_ttl),
            log_format: LogFormat::from_lookup(&lookup),
        }
    }

    /// Bind address, or `None` if `HOST` is not an IP address.
    pub fn bind_addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().ok()
    }

    /// Path of the redb file, when persistent storage is configured.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(DATABASE_FILE))
    }
}
