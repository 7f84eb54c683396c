// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the OLA gateway clients using wiremock.

use std::sync::Arc;
use std::time::Duration;

use savant_energy::dmx::{
    DmxAddressResolver, DmxApiStats, DmxCommandSender, DmxFrame, DmxStatusReader,
};
use savant_energy::error::{CommandError, ResolutionError};
use savant_energy::protocol::{GatewayClient, GatewayConfig};
use savant_energy::types::{DmxAddress, DmxUid};
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> GatewayClient {
    GatewayConfig::new(server.uri())
        .with_timeout(Duration::from_secs(2))
        .into_client()
        .unwrap()
}

fn addr(value: u16) -> DmxAddress {
    DmxAddress::new(value).unwrap()
}

// ============================================================================
// Address resolution
// ============================================================================

mod resolver {
    use super::*;

    #[tokio::test]
    async fn resolves_and_caches_address() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .and(query_param("id", "1"))
            .and(query_param("uid", "1234:567891"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"address": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = DmxAddressResolver::new(gateway(&server));
        let uid = DmxUid::from_device_uid("1234567890.1");

        assert_eq!(resolver.resolve(&uid).await, Some(addr(7)));
        assert_eq!(resolver.resolve(&uid).await, Some(addr(7)));
        assert_eq!(resolver.cached(&uid), Some(addr(7)));
    }

    #[tokio::test]
    async fn expired_entry_is_fetched_again() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"address": "12"})))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = DmxAddressResolver::with_ttl(gateway(&server), Duration::from_millis(50));
        let uid = DmxUid::from_device_uid("1234567890");

        assert_eq!(resolver.resolve(&uid).await, Some(addr(12)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(resolver.resolve(&uid).await, Some(addr(12)));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = DmxAddressResolver::new(gateway(&server));
        let uid = DmxUid::from_device_uid("1234567890");

        assert!(resolver.resolve(&uid).await.is_none());
        assert!(resolver.resolve(&uid).await.is_none());
        assert_eq!(resolver.cache_len(), 0);
    }

    #[tokio::test]
    async fn status_error_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver = DmxAddressResolver::new(gateway(&server));
        let err = resolver
            .try_resolve(&DmxUid::from_device_uid("1234567890"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Status(404)));
    }

    #[tokio::test]
    async fn missing_or_invalid_address_yields_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .and(query_param("uid", "1234:567890"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "not found"})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .and(query_param("uid", "9999:000000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"address": 600})))
            .mount(&server)
            .await;

        let resolver = DmxAddressResolver::new(gateway(&server));
        assert!(
            resolver
                .resolve(&DmxUid::from_device_uid("1234567890"))
                .await
                .is_none()
        );

        let err = resolver
            .try_resolve(&DmxUid::from_device_uid("9999000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::OutOfRange(_)));
    }
}

// ============================================================================
// Frame writes
// ============================================================================

mod sender {
    use super::*;

    #[tokio::test]
    async fn posts_full_frame_and_records_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("u=1&d=255,0,255"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let sender = DmxCommandSender::new(gateway(&server), Arc::new(DmxApiStats::new()));
        assert!(sender.send(&DmxFrame::from_levels(vec![255, 0, 255])).await);

        let stats = sender.stats();
        assert_eq!(stats.request_count, 1);
        assert_eq!(stats.failure_count, 0);
        assert!((stats.success_rate - 100.0).abs() < f64::EPSILON);
        assert!(stats.last_successful_call.is_some());
        assert!(sender.is_api_available());
    }

    #[tokio::test]
    async fn frames_go_to_universe_one_whatever_the_discovery_universe() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .and(body_string("u=1&d=0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/json/rdm/uid_info"))
            .and(query_param("id", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"address": 4})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get_dmx"))
            .and(query_param("u", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dmx": [0, 0, 0, 255]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = GatewayConfig::new(server.uri())
            .with_universe(3)
            .into_client()
            .unwrap();
        let stats = Arc::new(DmxApiStats::new());
        let sender = DmxCommandSender::new(client.clone(), Arc::clone(&stats));
        assert!(sender.send(&DmxFrame::from_levels(vec![0])).await);

        let resolver = DmxAddressResolver::new(client.clone());
        let address = resolver
            .resolve(&DmxUid::from_device_uid("1234567890"))
            .await
            .unwrap();
        assert_eq!(address, addr(4));

        let states = DmxStatusReader::new(client, stats)
            .channel_states(&[address])
            .await;
        assert_eq!(states.get(&address), Some(&true));
    }

    #[tokio::test]
    async fn server_error_counts_as_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sender = DmxCommandSender::new(gateway(&server), Arc::new(DmxApiStats::new()));
        let err = sender
            .try_send(&DmxFrame::from_levels(vec![255]))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Status { status: 500, ref body } if body == "boom"));

        assert!(!sender.send(&DmxFrame::from_levels(vec![255])).await);

        let stats = sender.stats();
        assert_eq!(stats.request_count, 2);
        assert_eq!(stats.failure_count, 2);
        assert!(stats.success_rate.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn success_rate_follows_every_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .and(body_string("u=1&d=255"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .and(body_string("u=1&d=0"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sender = DmxCommandSender::new(gateway(&server), Arc::new(DmxApiStats::new()));
        let mut last_requests = 0;
        for levels in [vec![255], vec![0], vec![255], vec![255]] {
            sender.send(&DmxFrame::from_levels(levels)).await;
            let stats = sender.stats();
            assert!(stats.request_count > last_requests);
            last_requests = stats.request_count;

            #[allow(clippy::cast_precision_loss)]
            let expected = (stats.request_count - stats.failure_count) as f64
                / stats.request_count as f64
                * 100.0;
            assert!((stats.success_rate - expected).abs() < f64::EPSILON);
        }
        assert_eq!(sender.stats().failure_count, 1);
        assert!((sender.stats().success_rate - 75.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn testing_mode_performs_no_io() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/set_dmx"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let sender = DmxCommandSender::new(gateway(&server), Arc::new(DmxApiStats::new()))
            .with_testing_mode(true);
        assert!(sender.send(&DmxFrame::from_levels(vec![255, 255])).await);
        assert_eq!(sender.stats().request_count, 1);
        assert_eq!(sender.stats().failure_count, 0);
    }

    #[tokio::test]
    async fn describe_renders_curl_line() {
        let server = MockServer::start().await;
        let sender = DmxCommandSender::new(gateway(&server), Arc::new(DmxApiStats::new()));

        assert_eq!(
            sender.describe(&DmxFrame::from_levels(vec![0, 255])),
            format!("curl -X POST -d \"u=1&d=0,255\" {}/set_dmx", server.uri())
        );
    }
}

// ============================================================================
// Level read-back
// ============================================================================

mod status {
    use super::*;

    #[tokio::test]
    async fn reads_channel_states() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/get_dmx"))
            .and(query_param("u", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dmx": [255, 0, 12]})))
            .mount(&server)
            .await;

        let stats = Arc::new(DmxApiStats::new());
        let reader = DmxStatusReader::new(gateway(&server), Arc::clone(&stats));
        let states = reader
            .channel_states(&[addr(1), addr(2), addr(3), addr(40)])
            .await;

        assert_eq!(states.len(), 3);
        assert_eq!(states.get(&addr(1)), Some(&true));
        assert_eq!(states.get(&addr(2)), Some(&false));
        assert_eq!(states.get(&addr(3)), Some(&true));
        assert!(!states.contains_key(&addr(40)));

        let snap = stats.snapshot();
        assert_eq!(snap.request_count, 1);
        assert_eq!(snap.failure_count, 0);
    }

    #[tokio::test]
    async fn failed_read_is_empty_and_counted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/get_dmx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let stats = Arc::new(DmxApiStats::new());
        let reader = DmxStatusReader::new(gateway(&server), Arc::clone(&stats));

        assert!(reader.channel_states(&[addr(1)]).await.is_empty());
        assert_eq!(stats.snapshot().failure_count, 1);
    }
}
