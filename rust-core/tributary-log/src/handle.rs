// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lifecycle helpers shared by backend implementations.
//
// `CloseSignal` lets a manager close every handle it created and wake any
// blocked read. `TailerReservations` enforces that one (group, partition)
// pair is read by at most one open tailer per manager.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::error::{LogError, LogResult};
use crate::name::Name;
use crate::offset::LogPartition;

/// A cloneable, idempotent close flag with async notification.
#[derive(Debug, Clone)]
pub struct CloseSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CloseSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Close. Returns `true` the first time only.
    pub fn close(&self) -> bool {
        self.sender.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.sender.borrow()
    }

    /// Fail with [`LogError::Closed`] once closed.
    pub fn ensure_open(&self) -> LogResult<()> {
        if self.is_closed() {
            Err(LogError::Closed)
        } else {
            Ok(())
        }
    }

    /// Resolves once the signal is closed.
    pub async fn closed(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so an error cannot happen here.
        let _ = receiver.wait_for(|closed| *closed).await;
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

type ReservationKey = (Name, LogPartition);

/// The set of (group, partition) pairs held by open tailers.
#[derive(Debug, Clone, Default)]
pub struct TailerReservations {
    held: Arc<Mutex<HashSet<ReservationKey>>>,
}

impl TailerReservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve every partition for `group`, all or nothing.
    pub fn reserve(&self, group: &Name, partitions: &[LogPartition]) -> LogResult<Reservation> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| LogError::fatal("tailer reservation lock poisoned"))?;
        if let Some(taken) = partitions.iter().find(|p| held.contains(&(group.clone(), (*p).clone()))) {
            return Err(LogError::AlreadyTailed {
                group: group.clone(),
                partition: taken.clone(),
            });
        }
        let keys: Vec<ReservationKey> = partitions.iter().map(|p| (group.clone(), p.clone())).collect();
        held.extend(keys.iter().cloned());
        Ok(Reservation {
            held: Arc::clone(&self.held),
            keys,
        })
    }

    pub fn is_reserved(&self, group: &Name, partition: &LogPartition) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&(group.clone(), partition.clone())))
            .unwrap_or(false)
    }
}

/// Held by a tailer; releases its partitions when dropped or released.
#[derive(Debug)]
pub struct Reservation {
    held: Arc<Mutex<HashSet<ReservationKey>>>,
    keys: Vec<ReservationKey>,
}

impl Reservation {
    pub fn release(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        if let Ok(mut held) = self.held.lock() {
            for key in self.keys.drain(..) {
                held.remove(&key);
            }
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.release();
    }
}
