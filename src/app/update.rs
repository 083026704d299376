//! Firmware update supervisor.
//!
//! Wraps one blocking, non-cancellable transfer in a reporting contract:
//!
//! ```text
//!   "updating" ──▶ updater.update(url) ──▶ exactly one of
//!                                          update_success
//!                                          update_failed
//!                                          no_update_needed
//! ```
//!
//! The terminal status is owed from the moment "updating" goes out. A
//! [`TerminalReport`] guard holds that debt; if the transfer unwinds
//! before an outcome is known, the guard pays it with `update_failed`
//! on drop.

use core::cell::Cell;

use log::{error, info, warn};

use crate::error::UpdateError;

use super::ports::{FirmwareUpdater, UpdateOutcome};
use super::telemetry::Status;

pub fn outcome_status(outcome: &UpdateOutcome) -> Status {
    match outcome {
        UpdateOutcome::Succeeded => Status::UpdateSucceeded,
        UpdateOutcome::Failed(_) => Status::UpdateFailed,
        UpdateOutcome::NoUpdateAvailable => Status::NoUpdateNeeded,
    }
}

/// Owes exactly one terminal status until [`settle`](Self::settle)d.
struct TerminalReport<'a, R: FnMut(Status)> {
    report: &'a mut R,
    busy: &'a Cell<bool>,
    settled: bool,
}

impl<R: FnMut(Status)> TerminalReport<'_, R> {
    fn settle(mut self, status: Status) {
        self.settled = true;
        (self.report)(status);
    }
}

impl<R: FnMut(Status)> Drop for TerminalReport<'_, R> {
    fn drop(&mut self) {
        if !self.settled {
            error!("Firmware update: {}", UpdateError::Aborted);
            (self.report)(Status::UpdateFailed);
        }
        self.busy.set(false);
    }
}

/// Re-entry guard for the single-threaded tick loop.
#[derive(Default)]
pub struct UpdateSupervisor {
    busy: Cell<bool>,
}

impl UpdateSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Run one update, reporting through `report`.
    ///
    /// On success the new image is activated after `update_success` has
    /// been reported; on real hardware that call does not return.
    pub fn perform_update<U, R>(&self, url: &str, updater: &mut U, mut report: R) -> UpdateOutcome
    where
        U: FirmwareUpdater,
        R: FnMut(Status),
    {
        if self.busy.replace(true) {
            warn!("Firmware update refused: {}", UpdateError::Busy);
            report(Status::UpdateFailed);
            return UpdateOutcome::Failed(UpdateError::Busy);
        }

        info!("Starting firmware update from {url}");
        report(Status::Updating);

        let guard = TerminalReport {
            report: &mut report,
            busy: &self.busy,
            settled: false,
        };
        let outcome = updater.update(url);
        match &outcome {
            UpdateOutcome::Succeeded => info!("Firmware update succeeded"),
            UpdateOutcome::NoUpdateAvailable => info!("No firmware update needed"),
            UpdateOutcome::Failed(e) => warn!("Firmware update failed: {e}"),
        }
        guard.settle(outcome_status(&outcome));

        if outcome == UpdateOutcome::Succeeded {
            updater.activate();
        }
        outcome
    }
}
