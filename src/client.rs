use chrono::{DateTime, TimeZone, Utc};
use log::{debug, error, info};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use url::form_urlencoded;

use crate::auth::{http_client, AuthenticatedRequester, Requester};
use crate::config::{ClientConfig, TokenFile};
use crate::error::{Error, Result};
use crate::identity::{CognitoIdentityProvider, IdentityProvider};
use crate::mapping::{list, parse_timestamp};
use crate::models::{
    ChannelType, ChargerDevice, Customer, OutletDevice, Vehicle, VehicleStatus, VueDevice,
    VueDeviceChannel, VueUsageDevice,
};
use crate::report::EvChargingReport;
use crate::retry::{Sleeper, TokioSleeper};
use crate::simulator::SimulatedRequester;
use crate::types::{Credentials, Scale, TokenSet, Unit};

const NOT_LOGGED_IN: &str = "Not logged in. Call one of the login methods first.";

/// Channels reported as aggregates; the chart endpoint has no history for them.
const MAINS_CHANNELS: [&str; 2] = ["MainsFromGrid", "MainsToGrid"];

/// Render a time as the UTC form the API expects (`2023-01-01T12:00:00Z`).
pub fn format_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    time.with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

/// Client for the energy monitoring service.
pub struct VueClient {
    config: ClientConfig,
    http: reqwest::Client,
    sleeper: Arc<dyn Sleeper>,
    requester: Option<Box<dyn Requester>>,
    username: Option<String>,
    customer: Option<Customer>,
    token_file: Option<TokenFile>,
}

impl VueClient {
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = http_client(config.connect_timeout()?, config.read_timeout()?)?;
        Ok(Self {
            config,
            http,
            sleeper: Arc::new(TokioSleeper),
            requester: None,
            username: None,
            customer: None,
            token_file: None,
        })
    }

    /// Replace how the client waits between retries.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Use an already prepared transport instead of logging in.
    pub fn with_requester(mut self, requester: Box<dyn Requester>) -> Self {
        self.requester = Some(requester);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn token_file(&self) -> Option<&TokenFile> {
        self.token_file.as_ref()
    }

    pub fn tokens(&self) -> Option<&TokenSet> {
        self.requester.as_ref().and_then(|r| r.tokens())
    }

    pub fn is_logged_in(&self) -> bool {
        self.requester.is_some()
    }

    /// Maintenance notice, if the service currently shows one.
    ///
    /// Does not require a login.
    pub async fn down_for_maintenance(&self) -> Result<Option<String>> {
        let response = self.http.get(&self.config.maintenance_url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            debug!("Maintenance probe returned {}", status);
            return Ok(None);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let json: Value = serde_json::from_str(&text)?;
        Ok(json.get("msg").and_then(Value::as_str).map(str::to_string))
    }

    /// Log in with a username and password.
    ///
    /// Returns whether the account's customer record could be loaded.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<bool> {
        let credentials = Credentials::new(username, Some(password.to_string()));
        let requester = self.authenticated_requester(credentials, None);
        self.start_session(requester).await
    }

    /// Resume a session from previously issued tokens.
    pub async fn login_with_tokens(
        &mut self,
        tokens: TokenSet,
        username: Option<&str>,
    ) -> Result<bool> {
        let credentials = Credentials::new(username.unwrap_or_default(), None);
        let requester = self.authenticated_requester(credentials, Some(tokens));
        self.start_session(requester).await
    }

    /// Resume from (and keep updating) a JSON token file.
    ///
    /// A password is only needed when the file holds no usable tokens.
    pub async fn login_with_token_file(
        &mut self,
        path: impl Into<PathBuf>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<bool> {
        let file = TokenFile::new(path);
        let stored = file.load()?;

        let username = username
            .map(str::to_string)
            .or_else(|| stored.username.clone())
            .unwrap_or_default();
        let credentials = Credentials::new(username, password.map(str::to_string));
        let requester = self
            .authenticated_requester(credentials, stored.token_set())
            .with_refresh_callback(Arc::new(file.clone()));

        self.token_file = Some(file);
        self.start_session(requester).await
    }

    /// Log in against a local simulator instead of the real service.
    pub async fn login_simulator(
        &mut self,
        host: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<bool> {
        let mut requester = SimulatedRequester::new(
            host,
            username.map(str::to_string),
            password.map(str::to_string),
        )
        .with_http_client(self.http.clone())
        .with_retry_policy(self.config.retry_policy())
        .with_sleeper(self.sleeper.clone());

        let username = requester.username().await?;
        self.install(Box::new(requester), username).await
    }

    fn authenticated_requester(
        &self,
        credentials: Credentials,
        tokens: Option<TokenSet>,
    ) -> AuthenticatedRequester {
        let provider: Box<dyn IdentityProvider> = Box::new(CognitoIdentityProvider::with_client(
            self.http.clone(),
            self.config.identity.clone(),
        ));
        AuthenticatedRequester::new(&self.config.host, provider, credentials, tokens)
            .with_http_client(self.http.clone())
            .with_retry_policy(self.config.retry_policy())
            .with_sleeper(self.sleeper.clone())
    }

    async fn start_session(&mut self, mut requester: AuthenticatedRequester) -> Result<bool> {
        let username = requester.username().await?;
        requester.persist_tokens();
        self.install(Box::new(requester), username).await
    }

    async fn install(&mut self, requester: Box<dyn Requester>, username: String) -> Result<bool> {
        info!("Logged in as {}", username);
        self.requester = Some(requester);
        self.username = Some(username);
        self.customer = self.get_customer_details().await?;
        Ok(self.customer.is_some())
    }

    /// Send a request through the active requester and decode the body.
    ///
    /// An empty body yields `None`; a non-success status is an API error.
    async fn call(&mut self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let requester = self
            .requester
            .as_mut()
            .ok_or_else(|| Error::Config(NOT_LOGGED_IN.to_string()))?;

        let response = requester.request(method.clone(), path, body).await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("{} {} failed with {}: {}", method, path, status, text);
            return Err(Error::Api(format!(
                "{} {} returned {}: {}",
                method, path, status, text
            )));
        }
        if text.trim().is_empty() {
            debug!("{} {} returned an empty body", method, path);
            return Ok(None);
        }

        serde_json::from_str(&text).map(Some).map_err(|e| {
            error!("Failed to parse response from {}: {}", path, e);
            Error::Json(e)
        })
    }

    async fn get(&mut self, path: &str) -> Result<Option<Value>> {
        self.call(Method::GET, path, None).await
    }

    async fn put(&mut self, path: &str, body: &Value) -> Result<Option<Value>> {
        self.call(Method::PUT, path, Some(body)).await
    }

    /// All devices on the account, with devices nested under another
    /// device flattened into the same list.
    pub async fn get_devices(&mut self) -> Result<Vec<VueDevice>> {
        let Some(json) = self.get("customers/devices").await? else {
            return Ok(Vec::new());
        };

        let mut devices = Vec::new();
        for raw in list(&json, "devices") {
            devices.push(VueDevice::from_json(raw));
            if let Some(nested) = raw.get("devices") {
                devices.extend(list(nested, "devices").iter().map(VueDevice::from_json));
            }
        }
        debug!("Found {} devices", devices.len());
        Ok(devices)
    }

    /// Fill in the location properties of `device`.
    pub async fn populate_device_properties(&mut self, mut device: VueDevice) -> Result<VueDevice> {
        let gid = device.device_gid.unwrap_or_default();
        let path = format!("devices/{}/locationProperties", gid);
        if let Some(json) = self.get(&path).await? {
            device.populate_location_properties(&json);
        }
        Ok(device)
    }

    pub async fn update_channel(&mut self, channel: &VueDeviceChannel) -> Result<VueDeviceChannel> {
        let mut updated = channel.clone();
        if let Some(json) = self.put("devices/channels", &channel.as_json()).await? {
            updated.merge_json(&json);
        }
        Ok(updated)
    }

    pub async fn get_customer_details(&mut self) -> Result<Option<Customer>> {
        let username = self
            .username
            .clone()
            .ok_or_else(|| Error::Config(NOT_LOGGED_IN.to_string()))?;
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("email", &username)
            .finish();
        let path = format!("customers?{}", query);

        Ok(self
            .get(&path)
            .await?
            .filter(Value::is_object)
            .map(|json| Customer::from_json(&json)))
    }

    /// Usage of every channel of the given devices at one instant, keyed by device gid.
    pub async fn get_device_list_usage(
        &mut self,
        device_gids: &[i64],
        instant: Option<DateTime<Utc>>,
        scale: Scale,
        unit: Unit,
    ) -> Result<HashMap<i64, VueUsageDevice>> {
        let gids = device_gids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join("+");
        let instant = instant.unwrap_or_else(Utc::now);
        let path = format!(
            "AppAPI?apiMethod=getDeviceListUsages&deviceGids={}&instant={}&scale={}&energyUnit={}",
            gids,
            format_time(&instant),
            scale,
            unit
        );

        let mut devices = HashMap::new();
        let Some(json) = self.get(&path).await? else {
            return Ok(devices);
        };
        let Some(usages) = json.get("deviceListUsages") else {
            return Ok(devices);
        };

        let timestamp = usages
            .get("instant")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
        if let Some(raw_devices) = usages.get("devices") {
            for raw in list(raw_devices, "devices") {
                let device = VueUsageDevice::from_json(raw, timestamp);
                devices.insert(device.device_gid.unwrap_or_default(), device);
            }
        }
        Ok(devices)
    }

    /// Usage history of one channel, plus the instant of the first bucket.
    ///
    /// Buckets without data are `None`.
    pub async fn get_chart_usage(
        &mut self,
        channel: &VueDeviceChannel,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        scale: Scale,
        unit: Unit,
    ) -> Result<(Vec<Option<f64>>, DateTime<Utc>)> {
        let start = start.unwrap_or_else(Utc::now);
        let end = end.unwrap_or_else(Utc::now);
        let channel_num = channel.channel_num.clone().unwrap_or_default();

        if MAINS_CHANNELS.contains(&channel_num.as_str()) {
            debug!("No chart data for aggregate channel {}", channel_num);
            return Ok((Vec::new(), start));
        }

        let path = format!(
            "AppAPI?apiMethod=getChartUsage&deviceGid={}&channel={}&start={}&end={}&scale={}&energyUnit={}",
            channel.device_gid.unwrap_or_default(),
            channel_num,
            format_time(&start),
            format_time(&end),
            scale,
            unit
        );
        let Some(json) = self.get(&path).await? else {
            return Ok((Vec::new(), start));
        };

        let first_instant = json
            .get("firstUsageInstant")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .unwrap_or(start);
        let usage: Vec<Option<f64>> = json
            .get("usageList")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(Value::as_f64).collect())
            .unwrap_or_default();
        Ok((usage, first_instant))
    }

    pub async fn get_outlets(&mut self) -> Result<Vec<OutletDevice>> {
        let json = self.get("customers/outlets").await?;
        Ok(json
            .map(|json| list(&json, "outlets").iter().map(OutletDevice::from_json).collect())
            .unwrap_or_default())
    }

    /// Switch an outlet. `on` of `None` resends the outlet's current state.
    pub async fn update_outlet(&mut self, outlet: &OutletDevice, on: Option<bool>) -> Result<OutletDevice> {
        let mut updated = outlet.clone();
        if let Some(on) = on {
            updated.outlet_on = Some(on);
        }
        if let Some(json) = self.put("devices/outlet", &updated.as_json()).await? {
            updated.merge_json(&json);
        }
        Ok(updated)
    }

    pub async fn get_chargers(&mut self) -> Result<Vec<ChargerDevice>> {
        let json = self.get("customers/evchargers").await?;
        Ok(json
            .map(|json| list(&json, "evChargers").iter().map(ChargerDevice::from_json).collect())
            .unwrap_or_default())
    }

    pub async fn update_charger(
        &mut self,
        charger: &ChargerDevice,
        on: Option<bool>,
        charge_rate: Option<i64>,
    ) -> Result<ChargerDevice> {
        let mut updated = charger.clone();
        if let Some(on) = on {
            updated.charger_on = Some(on);
        }
        if let Some(rate) = charge_rate {
            updated.charging_rate = Some(rate);
        }
        if let Some(json) = self.put("devices/evcharger", &updated.as_json()).await? {
            updated.merge_json(&json);
        }
        Ok(updated)
    }

    /// Current state of every outlet and charger in one call.
    pub async fn get_devices_status(&mut self) -> Result<(Vec<OutletDevice>, Vec<ChargerDevice>)> {
        let Some(json) = self.get("customers/devices/status").await? else {
            return Ok((Vec::new(), Vec::new()));
        };

        let outlets = json
            .get("outlets")
            .map(|raw| list(raw, "outlets").iter().map(OutletDevice::from_json).collect())
            .unwrap_or_default();
        let chargers = json
            .get("evChargers")
            .map(|raw| list(raw, "evChargers").iter().map(ChargerDevice::from_json).collect())
            .unwrap_or_default();
        Ok((outlets, chargers))
    }

    pub async fn get_channel_types(&mut self) -> Result<Vec<ChannelType>> {
        let json = self.get("devices/channels/channeltypes").await?;
        Ok(json
            .map(|json| list(&json, "channelTypes").iter().map(ChannelType::from_json).collect())
            .unwrap_or_default())
    }

    pub async fn get_vehicles(&mut self) -> Result<Vec<Vehicle>> {
        let json = self.get("customers/vehicles").await?;
        Ok(json
            .map(|json| list(&json, "vehicles").iter().map(Vehicle::from_json).collect())
            .unwrap_or_default())
    }

    pub async fn get_vehicle_status(&mut self, vehicle_gid: i64) -> Result<Option<VehicleStatus>> {
        let path = format!("vehicles/v2/settings?vehicleGid={}", vehicle_gid);
        Ok(self
            .get(&path)
            .await?
            .filter(Value::is_object)
            .map(|json| VehicleStatus::from_json(&json)))
    }

    pub async fn get_ev_charging_report(
        &mut self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<EvChargingReport>> {
        let path = format!(
            "devices/{}/evcharger/report?start={}&end={}",
            device_id,
            format_time(&start),
            format_time(&end)
        );
        match self.get(&path).await? {
            Some(json) => Ok(Some(serde_json::from_value(json)?)),
            None => Ok(None),
        }
    }
}
