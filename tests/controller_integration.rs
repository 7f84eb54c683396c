// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the breaker controller against a mocked gateway.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use savant_energy::controller::{
    BreakerController, BreakerPhase, BulkOutcome, ControllerSettings, ToggleOutcome,
};
use savant_energy::dmx::{DmxAddressResolver, DmxApiStats, DmxCommandSender, UnknownBreakerPolicy};
use savant_energy::error::Error;
use savant_energy::event::ControllerEvent;
use savant_energy::protocol::GatewayConfig;
use savant_energy::registry::DeviceRegistry;
use savant_energy::telemetry::{BreakerDemand, TelemetryDocument};
use savant_energy::types::DmxAddress;
use serde_json::json;
use tokio::sync::broadcast;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Breaker on DMX address 1, relay closed.
const MAIN: &str = "1234567890";
/// Breaker on DMX address 2, relay open.
const KITCHEN: &str = "1234567890.1";

fn demand(uid: &str, name: &str, percent: Option<u8>) -> BreakerDemand {
    BreakerDemand {
        uid: uid.to_string(),
        name: name.to_string(),
        capacity: Some(7.2),
        power_kw: Some(0.4),
        voltage: Some(120.0),
        percent_commanded: percent,
    }
}

fn snapshot(main: Option<u8>, kitchen: Option<u8>) -> TelemetryDocument {
    TelemetryDocument::new(vec![
        demand(MAIN, "Main", main),
        demand(KITCHEN, "Kitchen", kitchen),
    ])
}

async fn mount_addresses(server: &MockServer) {
    for (dmx_uid, address) in [("1234:567890", 1), ("1234:567891", 2)] {
        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .and(query_param("uid", dmx_uid))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"address": address})))
            .mount(server)
            .await;
    }
}

async fn mount_set_dmx(server: &MockServer, body: &str, status: u16, times: u64) {
    Mock::given(method("POST"))
        .and(path("/set_dmx"))
        .and(body_string(body))
        .respond_with(ResponseTemplate::new(status))
        .expect(times)
        .mount(server)
        .await;
}

fn controller(server: &MockServer, settings: ControllerSettings) -> BreakerController {
    let gateway = GatewayConfig::new(server.uri())
        .with_timeout(Duration::from_secs(2))
        .into_client()
        .unwrap();
    let registry = Arc::new(DeviceRegistry::new());
    registry.update(snapshot(Some(100), Some(0)));

    BreakerController::new(
        registry,
        DmxAddressResolver::new(gateway.clone()),
        DmxCommandSender::new(gateway, Arc::new(DmxApiStats::new())),
        settings,
    )
}

fn no_cooldown() -> ControllerSettings {
    ControllerSettings::new().with_cooldown(Duration::ZERO)
}

fn drain(events: &mut broadcast::Receiver<ControllerEvent>) -> Vec<ControllerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ============================================================================
// Switching
// ============================================================================

mod switching {
    use super::*;

    #[tokio::test]
    async fn turn_on_writes_full_frame() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        mount_set_dmx(&server, "u=1&d=255,255", 200, 1).await;

        let controller = controller(&server, no_cooldown());
        assert_eq!(controller.resolve_addresses().await, 2);
        let mut events = controller.subscribe();

        let outcome = controller.turn_on(KITCHEN).await.unwrap();
        assert_eq!(outcome, ToggleOutcome::Switched { on: true });
        assert_eq!(controller.is_on(KITCHEN), Some(true));

        let state = controller.control_state(KITCHEN).unwrap();
        assert_eq!(state.phase(), BreakerPhase::Ready(DmxAddress::new(2).unwrap()));
        assert_eq!(state.last_commanded_on(), Some(true));
        assert!(state.last_command_at().is_some());

        assert_eq!(
            drain(&mut events),
            vec![ControllerEvent::StateChanged {
                uid: KITCHEN.into(),
                on: true
            }]
        );
    }

    #[tokio::test]
    async fn first_command_resolves_its_own_address() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        // Only the target address is known, so the frame ends at it.
        mount_set_dmx(&server, "u=1&d=0", 200, 1).await;

        let controller = controller(&server, no_cooldown());
        let outcome = controller.turn_off(MAIN).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Switched { on: false });
        assert_eq!(
            controller.registry().address(MAIN),
            Some(DmxAddress::new(1).unwrap())
        );
    }

    #[tokio::test]
    async fn unknown_state_follows_policy_in_frame() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        mount_set_dmx(&server, "u=1&d=0,0", 200, 1).await;

        let controller = controller(
            &server,
            no_cooldown().with_unknown_breaker_policy(UnknownBreakerPolicy::AssumeOff),
        );
        controller.registry().update(snapshot(None, Some(100)));
        controller.resolve_addresses().await;

        let outcome = controller.turn_off(KITCHEN).await.unwrap();
        assert!(outcome.is_switched());
    }

    #[tokio::test]
    async fn requested_state_already_held_sends_nothing() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let controller = controller(&server, no_cooldown());
        assert_eq!(
            controller.turn_on(MAIN).await.unwrap(),
            ToggleOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn toggle_flips_believed_state() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        mount_set_dmx(&server, "u=1&d=255,255", 200, 1).await;

        let controller = controller(&server, no_cooldown());
        controller.resolve_addresses().await;

        assert_eq!(
            controller.toggle(KITCHEN).await.unwrap(),
            ToggleOutcome::Switched { on: true }
        );
    }
}

// ============================================================================
// Cooldown gate
// ============================================================================

mod cooldown {
    use super::*;

    #[tokio::test]
    async fn second_command_is_rate_limited_without_io() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        // Exactly one write reaches the gateway.
        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let controller = controller(&server, ControllerSettings::new());
        controller.resolve_addresses().await;
        let mut events = controller.subscribe();

        assert!(controller.turn_on(KITCHEN).await.unwrap().is_switched());

        // A different breaker shares the same gate.
        let outcome = controller.turn_off(MAIN).await.unwrap();
        let ToggleOutcome::RateLimited { retry_after } = outcome else {
            panic!("expected rate limit, got {outcome:?}");
        };
        assert!(retry_after <= Duration::from_secs(30));
        assert!(retry_after > Duration::from_secs(25));
        assert_eq!(controller.is_on(MAIN), Some(true));

        let limited: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(ControllerEvent::is_rate_limited)
            .collect();
        assert_eq!(
            limited,
            vec![ControllerEvent::RateLimited {
                uid: MAIN.into(),
                name: "Main".into(),
                retry_after_secs: 30,
            }]
        );
    }

    #[tokio::test]
    async fn gate_reopens_after_cooldown() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let controller = controller(
            &server,
            ControllerSettings::new().with_cooldown(Duration::from_millis(150)),
        );
        controller.resolve_addresses().await;

        assert!(controller.turn_on(KITCHEN).await.unwrap().is_switched());
        assert!(controller.turn_off(MAIN).await.unwrap().is_rate_limited());
        assert!(controller.cooldown_remaining().await.is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(controller.cooldown_remaining().await.is_none());
        assert!(controller.turn_off(MAIN).await.unwrap().is_switched());
    }

    #[tokio::test]
    async fn failed_write_still_closes_the_gate() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        mount_set_dmx(&server, "u=1&d=255,255", 500, 1).await;

        let controller = controller(&server, ControllerSettings::new());
        controller.resolve_addresses().await;
        let mut events = controller.subscribe();

        let err = controller.turn_on(KITCHEN).await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(controller.is_on(KITCHEN), Some(false));
        assert!(
            controller
                .control_state(KITCHEN)
                .unwrap()
                .last_command_at()
                .is_none()
        );
        assert_eq!(controller.api_stats().failure_count, 1);
        assert!(matches!(
            drain(&mut events).as_slice(),
            [ControllerEvent::CommandFailed { uid, .. }] if uid == KITCHEN
        ));

        assert!(controller.turn_on(KITCHEN).await.unwrap().is_rate_limited());
    }
}

// ============================================================================
// Address resolution failures
// ============================================================================

mod resolution {
    use super::*;

    #[tokio::test]
    async fn unresolved_address_fails_without_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let controller = controller(&server, ControllerSettings::new());
        let mut events = controller.subscribe();

        let err = controller.turn_on(KITCHEN).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
        assert!(controller.control_state(KITCHEN).is_none());
        assert!(controller.cooldown_remaining().await.is_none());

        let events = drain(&mut events);
        assert!(matches!(
            events.as_slice(),
            [ControllerEvent::AddressUnresolved { uid, dmx_uid }]
                if uid == KITCHEN && dmx_uid.as_str() == "1234:567891"
        ));
    }

    #[tokio::test]
    async fn unknown_breaker_is_rejected() {
        let server = MockServer::start().await;
        let controller = controller(&server, ControllerSettings::new());

        assert!(matches!(
            controller.turn_on("nope").await,
            Err(Error::UnknownBreaker(uid)) if uid == "nope"
        ));
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

mod reconciliation {
    use super::*;

    #[tokio::test]
    async fn telemetry_inside_window_is_ignored() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        mount_set_dmx(&server, "u=1&d=255,255", 200, 1).await;

        let controller = controller(&server, ControllerSettings::new());
        controller.resolve_addresses().await;
        controller.turn_on(KITCHEN).await.unwrap();

        // Stale read right after the command.
        controller.reconcile(&snapshot(Some(100), Some(0)));
        assert_eq!(
            controller.control_state(KITCHEN).unwrap().last_commanded_on(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn telemetry_after_window_is_adopted() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        mount_set_dmx(&server, "u=1&d=255,255", 200, 1).await;

        let controller = controller(
            &server,
            ControllerSettings::new()
                .with_cooldown(Duration::from_millis(100))
                .with_reconcile_window(Duration::from_millis(100)),
        );
        controller.resolve_addresses().await;
        controller.turn_on(KITCHEN).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let mut events = controller.subscribe();
        controller.reconcile(&snapshot(Some(100), Some(0)));

        assert_eq!(
            controller.control_state(KITCHEN).unwrap().last_commanded_on(),
            Some(false)
        );
        assert!(drain(&mut events).contains(&ControllerEvent::StateChanged {
            uid: KITCHEN.into(),
            on: false
        }));
    }

    #[tokio::test]
    async fn relay_levels_read_back_from_gateway() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        Mock::given(method("GET"))
            .and(path("/get_dmx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dmx": [0, 255, 0]})))
            .mount(&server)
            .await;

        let controller = controller(&server, ControllerSettings::new());
        controller.resolve_addresses().await;

        let levels = controller.relay_levels().await;
        assert_eq!(levels.get(MAIN), Some(&false));
        assert_eq!(levels.get(KITCHEN), Some(&true));
    }
}

// ============================================================================
// Bulk commands
// ============================================================================

mod bulk {
    use super::*;

    #[tokio::test]
    async fn scene_sets_listed_and_defaults_others() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        mount_set_dmx(&server, "u=1&d=255,0", 200, 1).await;

        let controller = controller(&server, no_cooldown());
        controller.resolve_addresses().await;

        let targets = HashMap::from([(KITCHEN.to_string(), false)]);
        let outcome = controller.apply_scene(&targets).await.unwrap();

        assert_eq!(outcome, BulkOutcome::Sent { channels: 2 });
        assert_eq!(controller.is_on(KITCHEN), Some(false));
    }

    #[tokio::test]
    async fn scene_with_unknown_breaker_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let controller = controller(&server, no_cooldown());
        let targets = HashMap::from([("ghost".to_string(), true)]);

        assert!(matches!(
            controller.apply_scene(&targets).await,
            Err(Error::UnknownBreaker(_))
        ));
    }

    #[tokio::test]
    async fn all_loads_on_covers_known_addresses() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;
        mount_set_dmx(&server, "u=1&d=255,255", 200, 1).await;

        let controller = controller(&server, ControllerSettings::new());
        controller.resolve_addresses().await;

        let outcome = controller.all_loads_on().await.unwrap();
        assert_eq!(outcome, BulkOutcome::Sent { channels: 2 });
        assert_eq!(controller.is_on(KITCHEN), Some(true));

        // Bulk commands go through the same gate.
        assert!(controller.all_loads_on().await.unwrap().is_rate_limited());
    }

    #[tokio::test]
    async fn preview_reflects_believed_states() {
        let server = MockServer::start().await;
        mount_addresses(&server).await;

        let controller = controller(&server, ControllerSettings::new());
        assert!(controller.command_preview().is_none());

        controller.resolve_addresses().await;
        assert_eq!(
            controller.command_preview().unwrap(),
            format!("curl -X POST -d \"u=1&d=255,0\" {}/set_dmx", server.uri())
        );
    }
}
