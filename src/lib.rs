// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SSH Custody Server - Encrypted SSH Key Custody Service
//!
//! Stores each user's SSH private key under a password-derived envelope key
//! hierarchy (KEK wraps DEK, DEK wraps the key) and records which hosts each
//! user may reach. Every API payload travels in a hybrid RSA-OAEP + AES-CBC
//! envelope keyed by a per-request session key.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum) and the sealed-envelope extractor
//! - `auth` - Session-token authentication and admin re-verification
//! - `crypto` - Symmetric engine, KDF, base64, transport key pair
//! - `secrets` - KEK/DEK envelope hierarchy
//! - `transport` - Request/response envelope codec
//! - `accounts`, `custody`, `access` - Account, key and ACL services
//! - `provisioning` - Background writer for granted hosts
//! - `storage` - Credential store (redb or in-memory)

pub mod access;
pub mod accounts;
pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod custody;
pub mod error;
pub mod models;
pub mod provisioning;
pub mod secrets;
pub mod state;
pub mod storage;
pub mod transport;
