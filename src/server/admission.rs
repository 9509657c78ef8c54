// src/server/admission.rs

//! Decides whether an accepted socket may become a connection.
//!
//! In multi-client mode every connection holds one permit of a semaphore sized
//! by `max_clients`. In single-client mode there is exactly one slot, recording
//! the id of the connection that holds it.

use crate::core::metrics;
use crate::core::protocol::FramingPolicy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// How many clients the listener serves at once.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// Any number of concurrent clients, up to `max_clients`.
    #[default]
    Multi,
    /// One client at a time; others are turned away while the slot is taken.
    Single,
}

impl ServerMode {
    /// The framing policy used when the configuration does not override it.
    pub fn default_framing(self) -> FramingPolicy {
        match self {
            ServerMode::Multi => FramingPolicy::WholeBuffer,
            ServerMode::Single => FramingPolicy::Lines,
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMode::Multi => write!(f, "multi"),
            ServerMode::Single => write!(f, "single"),
        }
    }
}

impl FromStr for ServerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "multi" => Ok(ServerMode::Multi),
            "single" => Ok(ServerMode::Single),
            other => Err(anyhow::anyhow!(
                "invalid mode '{other}', expected 'multi' or 'single'"
            )),
        }
    }
}

/// Why an accepted socket was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Single-client mode and the slot is held by connection `active`.
    Busy { active: u64 },
    /// Multi-client mode and the cap has been reached.
    MaxClients(usize),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Busy { active } => {
                write!(f, "busy, connection {active} holds the only slot")
            }
            RejectReason::MaxClients(max) => write!(f, "max number of clients ({max}) reached"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionController {
    mode: ServerMode,
    max_clients: usize,
    permits: Arc<Semaphore>,
    slot: Arc<Mutex<Option<u64>>>,
}

impl AdmissionController {
    pub fn new(mode: ServerMode, max_clients: usize) -> Self {
        Self {
            mode,
            max_clients,
            permits: Arc::new(Semaphore::new(max_clients)),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn mode(&self) -> ServerMode {
        self.mode
    }

    /// Claims room for connection `id`, or explains why there is none.
    ///
    /// The returned lease must live exactly as long as the connection's
    /// transport.
    pub fn try_admit(&self, id: u64) -> Result<SlotLease, RejectReason> {
        match self.mode {
            ServerMode::Multi => self
                .permits
                .clone()
                .try_acquire_owned()
                .map(|permit| SlotLease {
                    id,
                    kind: LeaseKind::Permit(permit),
                })
                .map_err(|_| RejectReason::MaxClients(self.max_clients)),
            ServerMode::Single => {
                let mut slot = self.slot.lock();
                if let Some(active) = *slot {
                    return Err(RejectReason::Busy { active });
                }
                *slot = Some(id);
                metrics::ADMISSION_SLOT_OCCUPIED.set(1.0);
                Ok(SlotLease {
                    id,
                    kind: LeaseKind::Slot(self.slot.clone()),
                })
            }
        }
    }

    /// The connection holding the single-client slot, if any.
    pub fn active_connection(&self) -> Option<u64> {
        *self.slot.lock()
    }

    /// How many more connections multi-client mode would admit right now.
    pub fn available(&self) -> usize {
        match self.mode {
            ServerMode::Multi => self.permits.available_permits(),
            ServerMode::Single => usize::from(self.slot.lock().is_none()),
        }
    }
}

#[derive(Debug)]
enum LeaseKind {
    Permit(#[allow(dead_code)] OwnedSemaphorePermit),
    Slot(Arc<Mutex<Option<u64>>>),
}

/// Proof of admission. Dropping it frees the room it claimed.
#[derive(Debug)]
pub struct SlotLease {
    id: u64,
    kind: LeaseKind,
}

impl SlotLease {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if let LeaseKind::Slot(slot) = &self.kind {
            let mut slot = slot.lock();
            // Only the holder may clear the slot.
            if *slot == Some(self.id) {
                *slot = None;
                metrics::ADMISSION_SLOT_OCCUPIED.set(0.0);
            }
        }
    }
}
