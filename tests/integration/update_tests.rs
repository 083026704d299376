//! Integration tests for supervised firmware updates.
//!
//! Every update run must publish `updating` followed by exactly one
//! terminal status, whatever the updater does.

use std::panic::{AssertUnwindSafe, catch_unwind};

use fieldlink::app::dispatcher::CommandDispatcher;
use fieldlink::app::ports::{FirmwareUpdater, UpdateOutcome};
use fieldlink::app::telemetry::Status;
use fieldlink::app::update::UpdateSupervisor;
use fieldlink::error::{CommandError, Error, UpdateError};

use crate::mock_ports::{
    COMMAND_TOPIC, MockBus, MockPorts, MockUpdater, connected_context, init_logging, mock_ports,
    publisher,
};

const UPDATE_CMD: &[u8] = br#"{"action":"FIRMWARE_UPDATE","url":"http://fw.local/agent.bin"}"#;

fn run_update(ports: &mut MockPorts) -> Option<Status> {
    let mut ctx = connected_context();
    CommandDispatcher::new(2_000)
        .handle(UPDATE_CMD, COMMAND_TOPIC, &mut ctx, &publisher(), ports)
        .unwrap()
}

fn ports_with(outcome: UpdateOutcome) -> MockPorts {
    let mut ports = mock_ports(true, MockBus::connected());
    ports.updater = MockUpdater::new(outcome);
    ports
}

// ── Terminal status per outcome ───────────────────────────────

#[test]
fn successful_update_reports_success_then_activates() {
    init_logging();
    let mut ports = ports_with(UpdateOutcome::Succeeded);

    assert_eq!(run_update(&mut ports), Some(Status::UpdateSucceeded));
    assert_eq!(ports.bus.statuses(), vec!["updating", "update_success"]);
    assert_eq!(ports.updater.urls, vec!["http://fw.local/agent.bin"]);
    assert_eq!(ports.updater.activations, 1);
}

#[test]
fn failed_update_reports_failure_and_stays_on_image() {
    let mut ports = ports_with(UpdateOutcome::Failed(UpdateError::Transport("HTTP 404".into())));

    assert_eq!(run_update(&mut ports), Some(Status::UpdateFailed));
    assert_eq!(ports.bus.statuses(), vec!["updating", "update_failed"]);
    assert_eq!(ports.updater.activations, 0);
}

#[test]
fn current_image_reports_no_update_needed() {
    let mut ports = ports_with(UpdateOutcome::NoUpdateAvailable);

    assert_eq!(run_update(&mut ports), Some(Status::NoUpdateNeeded));
    assert_eq!(ports.bus.statuses(), vec!["updating", "no_update_needed"]);
    assert_eq!(ports.updater.activations, 0);
}

#[test]
fn update_without_url_is_rejected_before_transfer() {
    let mut ctx = connected_context();
    let mut ports = ports_with(UpdateOutcome::Succeeded);

    let err = CommandDispatcher::new(2_000)
        .handle(
            br#"{"action":"FIRMWARE_UPDATE"}"#,
            COMMAND_TOPIC,
            &mut ctx,
            &publisher(),
            &mut ports,
        )
        .unwrap_err();

    assert!(matches!(err, Error::Command(CommandError::MissingField { field: "url", .. })));
    assert!(ports.updater.urls.is_empty());
    assert_eq!(ports.bus.statuses(), vec!["command_rejected"]);
}

// ── Abnormal termination ──────────────────────────────────────

#[test]
fn aborted_transfer_still_reports_one_terminal_status() {
    let mut ports = ports_with(UpdateOutcome::Succeeded);
    ports.updater.panic_on_update = true;
    let dispatcher = CommandDispatcher::new(2_000);
    let telemetry = publisher();
    let mut ctx = connected_context();

    let result = catch_unwind(AssertUnwindSafe(|| {
        dispatcher.handle(UPDATE_CMD, COMMAND_TOPIC, &mut ctx, &telemetry, &mut ports)
    }));

    assert!(result.is_err());
    assert_eq!(ports.bus.statuses(), vec!["updating", "update_failed"]);
    assert_eq!(ports.updater.activations, 0);

    // The busy flag was released; a later update runs normally.
    ports.updater.panic_on_update = false;
    let status = dispatcher
        .handle(UPDATE_CMD, COMMAND_TOPIC, &mut ctx, &telemetry, &mut ports)
        .unwrap();
    assert_eq!(status, Some(Status::UpdateSucceeded));
    assert_eq!(
        ports.bus.statuses(),
        vec!["updating", "update_failed", "updating", "update_success"]
    );
}

/// Starts a second update on the same supervisor from inside the first.
struct Reentrant<'a> {
    supervisor: &'a UpdateSupervisor,
    nested_outcome: Option<UpdateOutcome>,
    nested_statuses: Vec<Status>,
    nested_calls: usize,
}

impl FirmwareUpdater for Reentrant<'_> {
    fn update(&mut self, url: &str) -> UpdateOutcome {
        let mut inner = MockUpdater::new(UpdateOutcome::Succeeded);
        let mut seen = Vec::new();
        let outcome = self
            .supervisor
            .perform_update(url, &mut inner, |s| seen.push(s));
        self.nested_outcome = Some(outcome);
        self.nested_statuses = seen;
        self.nested_calls = inner.urls.len();
        UpdateOutcome::NoUpdateAvailable
    }
}

#[test]
fn concurrent_update_is_refused_with_failure() {
    let supervisor = UpdateSupervisor::new();
    let mut updater = Reentrant {
        supervisor: &supervisor,
        nested_outcome: None,
        nested_statuses: Vec::new(),
        nested_calls: 0,
    };
    let mut outer = Vec::new();

    let outcome = supervisor.perform_update("http://fw.local/a.bin", &mut updater, |s| outer.push(s));

    assert_eq!(outcome, UpdateOutcome::NoUpdateAvailable);
    assert_eq!(outer, vec![Status::Updating, Status::NoUpdateNeeded]);
    assert_eq!(
        updater.nested_outcome,
        Some(UpdateOutcome::Failed(UpdateError::Busy))
    );
    assert_eq!(updater.nested_statuses, vec![Status::UpdateFailed]);
    assert_eq!(updater.nested_calls, 0);
    assert!(!supervisor.is_busy());
}
