// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Grant Provisioning
//!
//! An accepted grant may hand a [`ProvisioningJob`] to a background worker,
//! which lays out the files the remote automation consumes:
//!
//! ```text
//! {PROVISION_DIR}/
//!   keys/admin_{ip}.pem       # mode 0400
//!   inventory/{ip}.ini
//! ```
//!
//! ## Delivery
//!
//! Dispatch is fire-and-forget over a bounded channel: each job is offered
//! once with `try_send` and never retried. A full or closed queue drops the
//! job (and zeroizes its key bytes) and reports it as not dispatched.
//!
//! ## Shutdown
//!
//! The worker stops on `CancellationToken` cancellation or when every
//! [`ProvisioningQueue`] handle has been dropped.

use std::fmt;
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::audit::AuditEventType;
use crate::audit_log;

/// Default bound of the job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One host to provision for a grantee.
pub struct ProvisioningJob {
    pub username: String,
    pub ssh_key: Zeroizing<Vec<u8>>,
    pub ip_address: IpAddr,
    pub remote_username: String,
}

impl fmt::Debug for ProvisioningJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningJob")
            .field("username", &self.username)
            .field("ip_address", &self.ip_address)
            .field("remote_username", &self.remote_username)
            .finish_non_exhaustive()
    }
}

/// Sending half, cloned into application state.
#[derive(Clone)]
pub struct ProvisioningQueue {
    sender: mpsc::Sender<ProvisioningJob>,
}

impl ProvisioningQueue {
    /// Offer a job once. Returns whether the worker accepted it.
    pub fn dispatch(&self, job: ProvisioningJob) -> bool {
        let username = job.username.clone();
        let ip = job.ip_address;

        match self.sender.try_send(job) {
            Ok(()) => {
                audit_log!(
                    AuditEventType::ProvisioningDispatched,
                    username,
                    "ip_address",
                    ip.to_string()
                );
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(username = %username, %ip, "Provisioning queue full, job dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(username = %username, %ip, "Provisioning worker stopped, job dropped");
                false
            }
        }
    }
}

/// Receiving half; consumes jobs until cancelled.
pub struct ProvisioningWorker {
    receiver: mpsc::Receiver<ProvisioningJob>,
    output_dir: PathBuf,
}

/// Create a connected queue and worker writing under `output_dir`.
pub fn channel(
    output_dir: impl Into<PathBuf>,
    capacity: usize,
) -> (ProvisioningQueue, ProvisioningWorker) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        ProvisioningQueue { sender },
        ProvisioningWorker {
            receiver,
            output_dir: output_dir.into(),
        },
    )
}

impl ProvisioningWorker {
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(dir = %self.output_dir.display(), "Provisioning worker starting");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Provisioning worker shutting down");
                    return;
                }
                job = self.receiver.recv() => match job {
                    Some(job) => self.handle(job).await,
                    None => {
                        info!("Provisioning queue closed, worker exiting");
                        return;
                    }
                },
            }
        }
    }

    async fn handle(&self, job: ProvisioningJob) {
        let root = self.output_dir.clone();
        let username = job.username.clone();
        let ip = job.ip_address;

        match tokio::task::spawn_blocking(move || write_job_files(&root, &job)).await {
            Ok(Ok(files)) => info!(
                username = %username,
                %ip,
                key = %files.key_file.display(),
                inventory = %files.inventory_file.display(),
                "Host provisioned"
            ),
            Ok(Err(e)) => warn!(username = %username, %ip, error = %e, "Provisioning failed"),
            Err(e) => error!(username = %username, %ip, error = %e, "Provisioning task panicked"),
        }
    }
}

/// Paths written for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedFiles {
    pub key_file: PathBuf,
    pub inventory_file: PathBuf,
}

fn file_stem(ip: IpAddr) -> String {
    ip.to_string().replace(':', "_")
}

/// Write the key file and inventory for one job.
pub fn write_job_files(root: &Path, job: &ProvisioningJob) -> io::Result<ProvisionedFiles> {
    let stem = file_stem(job.ip_address);

    let keys_dir = root.join("keys");
    std::fs::create_dir_all(&keys_dir)?;
    let key_name = format!("admin_{stem}.pem");
    let key_file = keys_dir.join(&key_name);

    // A previous key file is read-only; replace rather than truncate.
    match std::fs::remove_file(&key_file) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o400);
    }
    let mut file = options.open(&key_file)?;
    file.write_all(&job.ssh_key)?;
    file.sync_all()?;

    let inventory_dir = root.join("inventory");
    std::fs::create_dir_all(&inventory_dir)?;
    let inventory_file = inventory_dir.join(format!("{stem}.ini"));
    let inventory = format!(
        "[host:vars]\n\
         ansible_ssh_private_key_file=keys/{key_name}\n\
         ansible_user={remote_user}\n\
         ca_name=admin_{stem}\n\
         \n\
         [host]\n\
         {ip}\n",
        remote_user = job.remote_username,
        ip = job.ip_address,
    );
    std::fs::write(&inventory_file, inventory)?;

    Ok(ProvisionedFiles {
        key_file,
        inventory_file,
    })
}
