mod common;

use chrono::{TimeZone, Utc};
use common::*;
use emvue::{
    ChargerDevice, ClientConfig, Error, OutletDevice, Scale, Unit, VueClient, VueDevice,
    VueDeviceChannel,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        host: server.uri(),
        maintenance_url: format!("{}/maintenance/maintenance.json", server.uri()),
        ..ClientConfig::default()
    }
}

async fn mount_customer(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/customers"))
        .and(query_param("email", EMAIL))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(include_str!("fixtures/customer.json")),
        )
        .mount(server)
        .await;
}

async fn logged_in_client(server: &MockServer) -> (VueClient, Arc<RecordingSleeper>) {
    init_logging();
    mount_customer(server).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut client = VueClient::with_config(config_for(server))
        .unwrap()
        .with_sleeper(sleeper.clone());
    assert!(client
        .login_simulator(&server.uri(), Some(EMAIL), None)
        .await
        .unwrap());
    (client, sleeper)
}

async fn respond(server: &MockServer, verb: &str, endpoint: &str, body: &str) {
    Mock::given(method(verb))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_loads_customer() {
    let server = MockServer::start().await;
    let (client, _) = logged_in_client(&server).await;

    assert_eq!(client.username(), Some(EMAIL));
    let customer = client.customer().unwrap();
    assert_eq!(customer.customer_gid, Some(456));
    assert_eq!(customer.first_name.as_deref(), Some("Jane"));
}

#[tokio::test]
async fn test_customer_email_is_percent_encoded() {
    init_logging();
    let server = MockServer::start().await;
    let email = "jane+energy@example.com";
    Mock::given(method("GET"))
        .and(path("/customers"))
        .and(query_param("email", email))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(include_str!("fixtures/customer.json")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut client = VueClient::with_config(config_for(&server)).unwrap();
    assert!(client
        .login_simulator(&server.uri(), Some(email), None)
        .await
        .unwrap());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].url.query(),
        Some("email=jane%2Benergy%40example.com")
    );
}

#[tokio::test]
async fn test_empty_customer_body() {
    let server = MockServer::start().await;
    respond(&server, "GET", "/customers", "").await;

    let mut client = VueClient::with_config(config_for(&server)).unwrap();
    let found = client
        .login_simulator(&server.uri(), Some(EMAIL), None)
        .await
        .unwrap();

    assert!(!found);
    assert!(client.customer().is_none());
    assert!(client.get_customer_details().await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_devices_flattens_nested_devices() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    respond(
        &server,
        "GET",
        "/customers/devices",
        include_str!("fixtures/devices.json"),
    )
    .await;

    let devices = client.get_devices().await.unwrap();
    let gids: Vec<_> = devices.iter().map(|d| d.device_gid).collect();
    assert_eq!(gids, vec![Some(123), Some(789), Some(999)]);

    let panel = &devices[0];
    assert_eq!(panel.model.as_deref(), Some("VUE002"));
    assert_eq!(panel.connected, Some(true));
    assert_eq!(panel.device_name.as_deref(), Some("Main Panel"));
    assert_eq!(panel.air_conditioning.as_deref(), Some("true"));
    assert_eq!(panel.parent_device_gid, None);
    assert!(panel.outlet.is_none());
    assert_eq!(panel.channels.len(), 2);
    assert_eq!(panel.channels[0].name, None);
    assert_eq!(panel.channels[1].channel_type_gid, Some(7));

    let plug = &devices[1];
    assert_eq!(plug.parent_channel_num.as_deref(), Some("4"));
    assert_eq!(plug.outlet.as_ref().unwrap().outlet_on, Some(true));

    let charger = devices[2].ev_charger.as_ref().unwrap();
    assert_eq!(charger.max_charging_rate, Some(40));
    assert_eq!(charger.status.as_deref(), Some("Standby"));
}

#[tokio::test]
async fn test_get_devices_empty_body() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    respond(&server, "GET", "/customers/devices", "").await;

    assert!(client.get_devices().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_populate_device_properties() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    respond(
        &server,
        "GET",
        "/devices/123/locationProperties",
        r#"{"deviceName": "Main Panel", "latitudeLongitude": {"latitude": 40.7, "longitude": -74.0}}"#,
    )
    .await;

    let device = client
        .populate_device_properties(VueDevice::new(123, "A1", "VUE002", "1.0"))
        .await
        .unwrap();
    assert_eq!(device.device_name.as_deref(), Some("Main Panel"));
    assert_eq!(device.latitude, Some(40.7));
    assert_eq!(device.model.as_deref(), Some("VUE002"));
}

#[tokio::test]
async fn test_update_channel_sends_channel_payload() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    let channel = VueDeviceChannel::new(123, "Old Name", "1");

    Mock::given(method("PUT"))
        .and(path("/devices/channels"))
        .and(body_json(channel.as_json()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "Updated Channel"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let updated = client.update_channel(&channel).await.unwrap();
    assert_eq!(updated.name.as_deref(), Some("Updated Channel"));
    assert_eq!(updated.channel_num.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_device_list_usage() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/AppAPI"))
        .and(query_param("apiMethod", "getDeviceListUsages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/device_list_usage.json")),
        )
        .mount(&server)
        .await;

    let instant = Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap();
    let usage = client
        .get_device_list_usage(&[123, 456], Some(instant), Scale::Minute, Unit::Kwh)
        .await
        .unwrap();

    assert_eq!(usage.len(), 2);
    let panel = &usage[&123];
    assert_eq!(panel.timestamp, Some(instant));
    assert_eq!(panel.channels["1,2,3"].usage, Some(0.05));
    assert_eq!(panel.channels["4"].usage, None);
    let nested = &panel.channels["1,2,3"].nested_devices[&789];
    assert_eq!(nested.channels["1,2,3"].percentage, Some(20.0));
    assert!(usage[&456].channels.is_empty());

    let requests = server.received_requests().await.unwrap();
    let query = requests.last().unwrap().url.query().unwrap().to_string();
    assert!(query.contains("deviceGids=123+456"), "{}", query);
    assert!(query.contains("instant=2023-01-01T12:00:00Z"), "{}", query);
    assert!(query.contains("scale=1MIN"), "{}", query);
    assert!(query.contains("energyUnit=KilowattHours"), "{}", query);
}

#[tokio::test]
async fn test_chart_usage() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/AppAPI"))
        .and(query_param("apiMethod", "getChartUsage"))
        .and(query_param("deviceGid", "123"))
        .and(query_param("channel", "1"))
        .and(query_param("start", "2023-01-01T00:00:00Z"))
        .and(query_param("end", "2023-01-01T23:59:59Z"))
        .and(query_param("scale", "1H"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "firstUsageInstant": "2023-01-01T00:00:00Z",
            "usageList": [1.0, null, 2.0]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = VueDeviceChannel::new(123, "Kitchen", "1");
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2023, 1, 1, 23, 59, 59).unwrap();
    let (usage, first) = client
        .get_chart_usage(&channel, Some(start), Some(end), Scale::Hour, Unit::Kwh)
        .await
        .unwrap();

    assert_eq!(usage, vec![Some(1.0), None, Some(2.0)]);
    assert_eq!(first, start);
}

#[tokio::test]
async fn test_outlets() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    respond(
        &server,
        "GET",
        "/customers/outlets",
        r#"{"outlets": [{"deviceGid": 789, "outletOn": true, "loadGid": 1001}]}"#,
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/devices/outlet"))
        .and(body_partial_json(serde_json::json!({"deviceGid": 789, "outletOn": false})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"deviceGid": 789, "outletOn": false})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outlets = client.get_outlets().await.unwrap();
    assert_eq!(outlets.len(), 1);
    assert_eq!(outlets[0].outlet_on, Some(true));

    let updated = client.update_outlet(&outlets[0], Some(false)).await.unwrap();
    assert_eq!(updated.outlet_on, Some(false));
    assert_eq!(updated.load_gid, Some(1001));
}

#[tokio::test]
async fn test_chargers() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    respond(
        &server,
        "GET",
        "/customers/evchargers",
        r#"[{"deviceGid": 999, "chargerOn": false, "maxChargingRate": 40}]"#,
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/devices/evcharger"))
        .and(body_partial_json(
            serde_json::json!({"deviceGid": 999, "chargerOn": true, "chargingRate": 16}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"deviceGid": 999, "chargerOn": true, "chargingRate": 16}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let chargers = client.get_chargers().await.unwrap();
    assert_eq!(chargers.len(), 1);
    assert_eq!(chargers[0].charger_on, Some(false));

    let updated = client
        .update_charger(&chargers[0], Some(true), Some(16))
        .await
        .unwrap();
    assert_eq!(updated.charger_on, Some(true));
    assert_eq!(updated.charging_rate, Some(16));
    assert_eq!(updated.max_charging_rate, Some(40));
}

#[tokio::test]
async fn test_devices_status() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    respond(
        &server,
        "GET",
        "/customers/devices/status",
        r#"{"outlets": [{"deviceGid": 789}], "evChargers": [{"deviceGid": 999}], "devicesConnected": []}"#,
    )
    .await;

    let (outlets, chargers): (Vec<OutletDevice>, Vec<ChargerDevice>) =
        client.get_devices_status().await.unwrap();
    assert_eq!(outlets[0].device_gid, Some(789));
    assert_eq!(chargers[0].device_gid, Some(999));
}

#[tokio::test]
async fn test_channel_types_and_vehicles() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    respond(
        &server,
        "GET",
        "/devices/channels/channeltypes",
        r#"[{"channelTypeGid": 1, "description": "Main", "selectable": true}]"#,
    )
    .await;
    respond(
        &server,
        "GET",
        "/customers/vehicles",
        r#"[{"vehicleGid": 111, "make": "Tesla", "model": "Model 3", "year": 2021}]"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/vehicles/v2/settings"))
        .and(query_param("vehicleGid", "111"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"settings": {"vehicleGid": 111, "batteryLevel": 80, "chargingState": "Charging"}}"#,
        ))
        .mount(&server)
        .await;

    let types = client.get_channel_types().await.unwrap();
    assert_eq!(types[0].description.as_deref(), Some("Main"));
    assert_eq!(types[0].selectable, Some(true));

    let vehicles = client.get_vehicles().await.unwrap();
    assert_eq!(vehicles[0].vehicle_gid, Some(111));
    assert_eq!(vehicles[0].model.as_deref(), Some("Model 3"));

    let status = client.get_vehicle_status(111).await.unwrap().unwrap();
    assert_eq!(status.battery_level, Some(80));
    assert_eq!(status.charging_state.as_deref(), Some("Charging"));
}

#[tokio::test]
async fn test_ev_charging_report() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/devices/C93A7B12DCF947F58E3B76/evcharger/report"))
        .and(query_param("start", "2025-08-01T00:00:00Z"))
        .and(query_param("end", "2025-09-01T00:00:00Z"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(include_str!("fixtures/ev_charging_report.json")),
        )
        .mount(&server)
        .await;
    respond(&server, "GET", "/devices/EMPTY/evcharger/report", "").await;

    let start = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();

    let report = client
        .get_ev_charging_report("C93A7B12DCF947F58E3B76", start, end)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.energy_kwhs, 75.65);
    assert_eq!(report.daily_charging_totals.len(), 1);
    assert_eq!(report.plug_in_sessions[0].charging_sessions.len(), 1);

    let missing = client
        .get_ev_charging_report("EMPTY", start, end)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_error_status_is_api_error() {
    let server = MockServer::start().await;
    let (mut client, _) = logged_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/customers/vehicles"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    match client.get_vehicles().await.unwrap_err() {
        Error::Api(msg) => assert!(msg.contains("404"), "{}", msg),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    let (mut client, sleeper) = logged_in_client(&server).await;
    Mock::given(method("GET"))
        .and(path("/customers/outlets"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    respond(&server, "GET", "/customers/outlets", "[]").await;

    assert!(client.get_outlets().await.unwrap().is_empty());
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(500)]);
}

#[tokio::test]
async fn test_down_for_maintenance() {
    let server = MockServer::start().await;
    let client = VueClient::with_config(config_for(&server)).unwrap();

    assert_eq!(client.down_for_maintenance().await.unwrap(), None);

    Mock::given(method("GET"))
        .and(path("/maintenance/maintenance.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"msg": "System maintenance in progress"})),
        )
        .mount(&server)
        .await;

    assert_eq!(
        client.down_for_maintenance().await.unwrap().as_deref(),
        Some("System maintenance in progress")
    );
}
