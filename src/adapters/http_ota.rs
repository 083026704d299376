//! HTTP firmware updater backed by the `esp-ota` crate.
//!
//! Flow: GET url → stream body into the inactive OTA partition →
//! finalize (image check) → set as boot partition → `activate()` reboots.
//!
//! | Server / flash result              | Outcome                         |
//! |------------------------------------|---------------------------------|
//! | 304 Not Modified                   | `NoUpdateAvailable`             |
//! | other non-2xx, read/write error    | `Failed(Transport)`             |
//! | finalize / boot partition rejected | `Failed(Verification)`          |
//! | all bytes written and accepted     | `Succeeded`                     |
//!
//! An interrupted transfer leaves the running image untouched: `esp-ota`
//! aborts the partition write when the update handle is dropped.

use log::{info, warn};

use crate::app::ports::{FirmwareUpdater, UpdateOutcome};
use crate::error::UpdateError;

const MAX_FIRMWARE_SIZE: u64 = 4 * 1024 * 1024; // 4 MB
const CHUNK_SIZE: usize = 4096;

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Downloading { bytes_written: u64 },
    /// Image staged and selected; `activate()` boots it.
    ReadyToReboot,
    Failed,
}

/// Map the response status line to an early outcome, if it decides one.
fn classify_status(status: u16) -> Option<UpdateOutcome> {
    match status {
        304 => Some(UpdateOutcome::NoUpdateAvailable),
        200..=299 => None,
        other => Some(UpdateOutcome::Failed(UpdateError::Transport(format!(
            "HTTP {other}"
        )))),
    }
}

fn check_declared_size(declared: Option<u64>) -> Result<(), UpdateError> {
    match declared {
        Some(0) => Err(UpdateError::Transport("empty firmware image".into())),
        Some(n) if n > MAX_FIRMWARE_SIZE => Err(UpdateError::Transport(format!(
            "firmware size {n} exceeds {MAX_FIRMWARE_SIZE}"
        ))),
        _ => Ok(()),
    }
}

/// Byte accounting shared by the device and simulation paths.
struct Progress {
    declared: Option<u64>,
    written: u64,
}

impl Progress {
    fn accept(&mut self, len: usize) -> Result<(), UpdateError> {
        let next = self.written + len as u64;
        if next > MAX_FIRMWARE_SIZE || self.declared.is_some_and(|d| next > d) {
            return Err(UpdateError::Transport("image larger than declared".into()));
        }
        self.written = next;
        Ok(())
    }

    fn complete(&self) -> Result<(), UpdateError> {
        match self.declared {
            _ if self.written == 0 => Err(UpdateError::Transport("empty firmware image".into())),
            Some(d) if d != self.written => Err(UpdateError::Transport(format!(
                "truncated: {} of {} bytes",
                self.written, d
            ))),
            _ => Ok(()),
        }
    }
}

// ── Updater ───────────────────────────────────────────────────

/// Scripted server response for the simulation backend.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub struct SimResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Content-Length to advertise; `None` means chunked.
    pub declared_len: Option<u64>,
    /// Fail finalize (corrupt image).
    pub reject_image: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimResponse {
    pub fn image(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            declared_len: Some(body.len() as u64),
            body,
            reject_image: false,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            declared_len: None,
            reject_image: false,
        }
    }
}

pub struct HttpOtaUpdater {
    state: OtaState,
    #[cfg(not(target_os = "espidf"))]
    sim: std::collections::HashMap<String, SimResponse>,
    #[cfg(not(target_os = "espidf"))]
    activations: u32,
}

impl Default for HttpOtaUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpOtaUpdater {
    pub fn new() -> Self {
        Self {
            state: OtaState::Idle,
            #[cfg(not(target_os = "espidf"))]
            sim: std::collections::HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            activations: 0,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    fn finish(&mut self, result: Result<(), UpdateError>) -> UpdateOutcome {
        match result {
            Ok(()) => {
                self.state = OtaState::ReadyToReboot;
                info!("OTA: image staged, ready to reboot");
                UpdateOutcome::Succeeded
            }
            Err(e) => {
                self.state = OtaState::Failed;
                warn!("OTA: {}", e);
                UpdateOutcome::Failed(e)
            }
        }
    }
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl HttpOtaUpdater {
    fn download(&mut self, url: &str) -> Result<Option<UpdateOutcome>, UpdateError> {
        use embedded_svc::http::client::Client;
        use embedded_svc::http::{Headers as _, Status as _};
        use embedded_svc::io::Read;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let transport = |what: &str, e: &dyn core::fmt::Debug| {
            UpdateError::Transport(format!("{what}: {e:?}"))
        };

        let config = Configuration {
            timeout: Some(core::time::Duration::from_secs(30)),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&config).map_err(|e| transport("connection", &e))?;
        let mut client = Client::wrap(connection);
        let request = client.get(url).map_err(|e| transport("request", &e))?;
        let mut response = request.submit().map_err(|e| transport("submit", &e))?;

        if let Some(early) = classify_status(response.status()) {
            return Ok(Some(early));
        }
        let declared = response
            .header("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok());
        check_declared_size(declared)?;
        info!("OTA: downloading {:?} bytes from {}", declared, url);

        let mut update = esp_ota::OtaUpdate::begin().map_err(|e| transport("ota begin", &e))?;
        let mut progress = Progress {
            declared,
            written: 0,
        };
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = response.read(&mut buf).map_err(|e| transport("read", &e))?;
            if n == 0 {
                break;
            }
            progress.accept(n)?;
            update
                .write(&buf[..n])
                .map_err(|e| transport("flash write", &e))?;
            self.state = OtaState::Downloading {
                bytes_written: progress.written,
            };
        }
        progress.complete()?;

        let mut completed = update
            .finalize()
            .map_err(|e| UpdateError::Verification(format!("finalize: {e:?}")))?;
        completed
            .set_as_boot_partition()
            .map_err(|e| UpdateError::Verification(format!("set boot partition: {e:?}")))?;
        Ok(None)
    }
}

#[cfg(target_os = "espidf")]
impl FirmwareUpdater for HttpOtaUpdater {
    fn update(&mut self, url: &str) -> UpdateOutcome {
        self.state = OtaState::Downloading { bytes_written: 0 };
        match self.download(url) {
            Ok(Some(early)) => {
                self.state = OtaState::Idle;
                early
            }
            Ok(None) => self.finish(Ok(())),
            Err(e) => self.finish(Err(e)),
        }
    }

    fn activate(&mut self) {
        if self.state == OtaState::ReadyToReboot {
            info!("OTA: rebooting into new firmware");
            esp_ota::restart();
        }
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl HttpOtaUpdater {
    /// Simulation: script the response for `url`. Unscripted URLs fail
    /// to connect.
    pub fn sim_serve(&mut self, url: &str, response: SimResponse) {
        self.sim.insert(url.to_owned(), response);
    }

    pub fn sim_activations(&self) -> u32 {
        self.activations
    }

    fn download(&mut self, url: &str) -> Result<Option<UpdateOutcome>, UpdateError> {
        let Some(response) = self.sim.get(url).cloned() else {
            return Err(UpdateError::Transport("connection refused".into()));
        };
        if let Some(early) = classify_status(response.status) {
            return Ok(Some(early));
        }
        check_declared_size(response.declared_len)?;
        let mut progress = Progress {
            declared: response.declared_len,
            written: 0,
        };
        for chunk in response.body.chunks(CHUNK_SIZE) {
            progress.accept(chunk.len())?;
            self.state = OtaState::Downloading {
                bytes_written: progress.written,
            };
        }
        progress.complete()?;
        if response.reject_image {
            return Err(UpdateError::Verification("image header invalid".into()));
        }
        Ok(None)
    }
}

#[cfg(not(target_os = "espidf"))]
impl FirmwareUpdater for HttpOtaUpdater {
    fn update(&mut self, url: &str) -> UpdateOutcome {
        self.state = OtaState::Downloading { bytes_written: 0 };
        match self.download(url) {
            Ok(Some(early)) => {
                self.state = OtaState::Idle;
                early
            }
            Ok(None) => self.finish(Ok(())),
            Err(e) => self.finish(Err(e)),
        }
    }

    fn activate(&mut self) {
        if self.state == OtaState::ReadyToReboot {
            info!("OTA: reboot into new firmware (simulation)");
            self.activations += 1;
            self.state = OtaState::Idle;
        }
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader cancels rollback.
///
/// Without this, the rollback watchdog reverts to the previous firmware
/// after a reset.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    info!("OTA rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
