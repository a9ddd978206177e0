//! Typed records for the service's JSON payloads.
//!
//! Scalar fields are `Option`s: a record starts from its defaults, keys
//! missing from a payload keep them, and an explicit `null` clears them.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::mapping::{list, wire_fields};

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// A monitor, smart plug or charger registered to the account.
#[derive(Debug, Clone, PartialEq)]
pub struct VueDevice {
    pub device_gid: Option<i64>,
    pub manufacturer_id: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub parent_device_gid: Option<i64>,
    pub parent_channel_num: Option<String>,
    pub channels: Vec<VueDeviceChannel>,
    pub outlet: Option<OutletDevice>,
    pub ev_charger: Option<ChargerDevice>,
    pub connected: Option<bool>,
    pub offline_since: Option<DateTime<Utc>>,
    // location properties
    pub device_name: Option<String>,
    pub display_name: Option<String>,
    pub zip_code: Option<String>,
    pub time_zone: Option<String>,
    pub usage_cent_per_kw_hour: Option<f64>,
    pub peak_demand_dollar_per_kw: Option<f64>,
    pub billing_cycle_start_day: Option<i64>,
    pub solar: Option<bool>,
    pub air_conditioning: Option<String>,
    pub heat_source: Option<String>,
    pub location_sqft: Option<String>,
    pub num_electric_cars: Option<String>,
    pub location_type: Option<String>,
    pub num_people: Option<String>,
    pub swimming_pool: Option<String>,
    pub hot_tub: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for VueDevice {
    fn default() -> Self {
        Self {
            device_gid: Some(0),
            manufacturer_id: Some(String::new()),
            model: Some(String::new()),
            firmware: Some(String::new()),
            parent_device_gid: Some(0),
            parent_channel_num: Some(String::new()),
            channels: Vec::new(),
            outlet: None,
            ev_charger: None,
            connected: Some(false),
            offline_since: Some(DateTime::<Utc>::MIN_UTC),
            device_name: Some(String::new()),
            display_name: Some(String::new()),
            zip_code: Some(String::new()),
            time_zone: Some(String::new()),
            usage_cent_per_kw_hour: Some(0.0),
            peak_demand_dollar_per_kw: Some(0.0),
            billing_cycle_start_day: Some(0),
            solar: Some(false),
            air_conditioning: Some(String::new()),
            heat_source: Some(String::new()),
            location_sqft: Some(String::new()),
            num_electric_cars: Some(String::new()),
            location_type: Some(String::new()),
            num_people: Some(String::new()),
            swimming_pool: Some(String::new()),
            hot_tub: Some(String::new()),
            latitude: Some(0.0),
            longitude: Some(0.0),
        }
    }
}

wire_fields! {
    fn apply_device_fields for VueDevice {
        "deviceGid" => device_gid: int,
        "manufacturerDeviceId" => manufacturer_id: text,
        "model" => model: text,
        "firmware" => firmware: text,
        "parentDeviceGid" => parent_device_gid: int,
        "parentChannelNum" => parent_channel_num: text,
    }
}

wire_fields! {
    fn apply_connection_fields for VueDevice {
        "connected" => connected: flag,
        "offlineSince" => offline_since: timestamp,
    }
}

wire_fields! {
    fn apply_location_fields for VueDevice {
        "deviceName" => device_name: text,
        "displayName" => display_name: text,
        "zipCode" => zip_code: text,
        "timeZone" => time_zone: text,
        "usageCentPerKwHour" => usage_cent_per_kw_hour: float,
        "peakDemandDollarPerKw" => peak_demand_dollar_per_kw: float,
        "billingCycleStartDay" => billing_cycle_start_day: int,
        "solar" => solar: flag,
    }
}

wire_fields! {
    fn apply_location_information for VueDevice {
        "airConditioning" => air_conditioning: text,
        "heatSource" => heat_source: text,
        "locationSqFt" => location_sqft: text,
        "numElectricCars" => num_electric_cars: text,
        "locationType" => location_type: text,
        "numPeople" => num_people: text,
        "swimmingPool" => swimming_pool: text,
        "hotTub" => hot_tub: text,
    }
}

wire_fields! {
    fn apply_coordinates for VueDevice {
        "latitude" => latitude: float,
        "longitude" => longitude: float,
    }
}

impl VueDevice {
    pub fn new(
        device_gid: i64,
        manufacturer_id: impl Into<String>,
        model: impl Into<String>,
        firmware: impl Into<String>,
    ) -> Self {
        Self {
            device_gid: Some(device_gid),
            manufacturer_id: Some(manufacturer_id.into()),
            model: Some(model.into()),
            firmware: Some(firmware.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let mut device = Self::default();
        device.merge_json(json);
        device
    }

    pub fn merge_json(&mut self, json: &Value) -> &mut Self {
        self.apply_device_fields(json);

        if let Some(channels) = json.get("channels") {
            self.channels = list(channels, "channels")
                .iter()
                .map(VueDeviceChannel::from_json)
                .collect();
        }
        if let Some(outlet) = json.get("outlet") {
            self.outlet = outlet.is_object().then(|| OutletDevice::from_json(outlet));
        }
        if let Some(charger) = json.get("evCharger") {
            self.ev_charger = charger.is_object().then(|| ChargerDevice::from_json(charger));
        }
        if let Some(connection) = json.get("deviceConnected") {
            self.apply_connection_fields(connection);
        }
        if let Some(location) = json.get("locationProperties") {
            self.populate_location_properties(location);
        }
        self
    }

    /// Apply a `locationProperties` payload.
    pub fn populate_location_properties(&mut self, json: &Value) -> &mut Self {
        self.apply_location_fields(json);
        if let Some(info) = json.get("locationInformation") {
            self.apply_location_information(info);
        }
        if let Some(coordinates) = json.get("latitudeLongitude") {
            self.apply_coordinates(coordinates);
        }
        self
    }
}

/// One measured circuit (or the mains) of a device.
#[derive(Debug, Clone, PartialEq)]
pub struct VueDeviceChannel {
    pub device_gid: Option<i64>,
    pub name: Option<String>,
    pub channel_num: Option<String>,
    pub channel_multiplier: Option<f64>,
    pub channel_type_gid: Option<i64>,
    pub channel_type: Option<String>,
    pub parent_channel_num: Option<String>,
    pub nested_devices: HashMap<i64, VueDevice>,
}

impl Default for VueDeviceChannel {
    fn default() -> Self {
        Self {
            device_gid: Some(0),
            name: Some(String::new()),
            channel_num: Some(String::new()),
            channel_multiplier: Some(1.0),
            channel_type_gid: Some(0),
            channel_type: Some(String::new()),
            parent_channel_num: None,
            nested_devices: HashMap::new(),
        }
    }
}

wire_fields! {
    fn apply_fields for VueDeviceChannel {
        "deviceGid" => device_gid: int,
        "name" => name: text,
        "channelNum" => channel_num: text,
        "channelMultiplier" => channel_multiplier: float,
        "channelTypeGid" => channel_type_gid: int,
        "type" => channel_type: text,
        "parentChannelNum" => parent_channel_num: text,
    }
}

impl VueDeviceChannel {
    pub fn new(device_gid: i64, name: impl Into<String>, channel_num: impl Into<String>) -> Self {
        Self {
            device_gid: Some(device_gid),
            name: Some(name.into()),
            channel_num: Some(channel_num.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let mut channel = Self::default();
        channel.merge_json(json);
        channel
    }

    pub fn merge_json(&mut self, json: &Value) -> &mut Self {
        self.apply_fields(json);
        self
    }

    pub fn as_json(&self) -> Value {
        json!({
            "deviceGid": self.device_gid,
            "name": self.name,
            "channelNum": self.channel_num,
            "channelMultiplier": self.channel_multiplier,
            "channelTypeGid": self.channel_type_gid,
            "type": self.channel_type,
            "parentChannelNum": self.parent_channel_num,
        })
    }
}

/// Usage snapshot of one device at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct VueUsageDevice {
    pub device_gid: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub channels: HashMap<String, VueDeviceChannelUsage>,
}

impl Default for VueUsageDevice {
    fn default() -> Self {
        Self {
            device_gid: Some(0),
            timestamp: None,
            channels: HashMap::new(),
        }
    }
}

wire_fields! {
    fn apply_fields for VueUsageDevice {
        "deviceGid" => device_gid: int,
    }
}

impl VueUsageDevice {
    pub fn new(device_gid: i64, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            device_gid: Some(device_gid),
            timestamp,
            channels: HashMap::new(),
        }
    }

    /// Build from a usage payload; channels are keyed by channel number.
    pub fn from_json(json: &Value, timestamp: Option<DateTime<Utc>>) -> Self {
        let mut device = Self {
            timestamp,
            ..Self::default()
        };
        device.merge_json(json);
        device
    }

    pub fn merge_json(&mut self, json: &Value) -> &mut Self {
        self.apply_fields(json);
        if let Some(usages) = json.get("channelUsages") {
            for raw in list(usages, "channelUsages") {
                let mut channel = VueDeviceChannelUsage::new(self.timestamp);
                channel.merge_json(raw);
                let key = channel.channel_num.clone().unwrap_or_default();
                self.channels.insert(key, channel);
            }
        }
        self
    }
}

/// Usage of one channel, possibly with devices plugged in below it.
#[derive(Debug, Clone, PartialEq)]
pub struct VueDeviceChannelUsage {
    pub device_gid: Option<i64>,
    pub usage: Option<f64>,
    pub channel_num: Option<String>,
    pub name: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub percentage: Option<f64>,
    pub nested_devices: HashMap<i64, VueUsageDevice>,
}

impl Default for VueDeviceChannelUsage {
    fn default() -> Self {
        Self {
            device_gid: Some(0),
            usage: Some(0.0),
            channel_num: Some(String::new()),
            name: Some(String::new()),
            timestamp: None,
            percentage: Some(0.0),
            nested_devices: HashMap::new(),
        }
    }
}

wire_fields! {
    fn apply_fields for VueDeviceChannelUsage {
        "name" => name: text,
        "deviceGid" => device_gid: int,
        "channelNum" => channel_num: text,
        "usage" => usage: float,
        "percentage" => percentage: float,
    }
}

impl VueDeviceChannelUsage {
    pub fn new(timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    pub fn merge_json(&mut self, json: &Value) -> &mut Self {
        // some responses wrap a single channel in `channelUsages`
        let json = match json.get("channelUsages") {
            Some(inner) if inner.is_object() => inner,
            _ => json,
        };

        self.apply_fields(json);
        if let Some(nested) = json.get("nestedDevices") {
            for raw in list(nested, "nestedDevices") {
                let device = VueUsageDevice::from_json(raw, self.timestamp);
                self.nested_devices
                    .insert(device.device_gid.unwrap_or_default(), device);
            }
        }
        self
    }
}

/// Smart plug state.
#[derive(Debug, Clone, PartialEq)]
pub struct OutletDevice {
    pub device_gid: Option<i64>,
    pub outlet_on: Option<bool>,
    pub load_gid: Option<i64>,
    pub schedules: Vec<Value>,
}

impl Default for OutletDevice {
    fn default() -> Self {
        Self {
            device_gid: Some(0),
            outlet_on: Some(false),
            load_gid: Some(0),
            schedules: Vec::new(),
        }
    }
}

wire_fields! {
    fn apply_fields for OutletDevice {
        "deviceGid" => device_gid: int,
        "outletOn" => outlet_on: flag,
        "loadGid" => load_gid: int,
    }
}

impl OutletDevice {
    pub fn new(device_gid: i64, on: bool) -> Self {
        Self {
            device_gid: Some(device_gid),
            outlet_on: Some(on),
            ..Self::default()
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let mut outlet = Self::default();
        outlet.merge_json(json);
        outlet
    }

    pub fn merge_json(&mut self, json: &Value) -> &mut Self {
        self.apply_fields(json);
        if let Some(schedules) = json.get("schedules") {
            self.schedules = list(schedules, "schedules").to_vec();
        }
        self
    }

    pub fn as_json(&self) -> Value {
        json!({
            "deviceGid": self.device_gid,
            "outletOn": self.outlet_on,
            "loadGid": self.load_gid,
        })
    }
}

/// EV charger state and settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargerDevice {
    pub device_gid: Option<i64>,
    pub load_gid: Option<i64>,
    pub charger_on: Option<bool>,
    pub message: Option<String>,
    pub status: Option<String>,
    pub icon: Option<String>,
    pub icon_label: Option<String>,
    pub icon_detail_text: Option<String>,
    pub fault_text: Option<String>,
    pub charging_rate: Option<i64>,
    pub max_charging_rate: Option<i64>,
    pub off_peak_schedules_enabled: Option<bool>,
    pub custom_schedules: Vec<Value>,
    pub debug_code: Option<String>,
    pub pro_control_code: Option<String>,
    pub breaker_pin: Option<String>,
}

impl Default for ChargerDevice {
    fn default() -> Self {
        Self {
            device_gid: Some(0),
            load_gid: Some(0),
            charger_on: Some(false),
            message: Some(String::new()),
            status: Some(String::new()),
            icon: Some(String::new()),
            icon_label: Some(String::new()),
            icon_detail_text: Some(String::new()),
            fault_text: Some(String::new()),
            charging_rate: Some(0),
            max_charging_rate: Some(0),
            off_peak_schedules_enabled: Some(false),
            custom_schedules: Vec::new(),
            debug_code: Some(String::new()),
            pro_control_code: Some(String::new()),
            breaker_pin: None,
        }
    }
}

wire_fields! {
    fn apply_fields for ChargerDevice {
        "deviceGid" => device_gid: int,
        "loadGid" => load_gid: int,
        "chargerOn" => charger_on: flag,
        "message" => message: text,
        "status" => status: text,
        "icon" => icon: text,
        "iconLabel" => icon_label: text,
        "iconDetailText" => icon_detail_text: text,
        "faultText" => fault_text: text,
        "chargingRate" => charging_rate: int,
        "maxChargingRate" => max_charging_rate: int,
        "offPeakSchedulesEnabled" => off_peak_schedules_enabled: flag,
        "debugCode" => debug_code: text,
        "proControlCode" => pro_control_code: text,
        "breakerPIN" => breaker_pin: text,
    }
}

impl ChargerDevice {
    pub fn new(device_gid: i64, on: bool) -> Self {
        Self {
            device_gid: Some(device_gid),
            charger_on: Some(on),
            ..Self::default()
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let mut charger = Self::default();
        charger.merge_json(json);
        charger
    }

    pub fn merge_json(&mut self, json: &Value) -> &mut Self {
        self.apply_fields(json);
        if let Some(schedules) = json.get("customSchedules") {
            self.custom_schedules = list(schedules, "customSchedules").to_vec();
        }
        self
    }

    /// Payload for updating the charger. `breakerPIN` is only sent when set.
    pub fn as_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("deviceGid".to_string(), json!(self.device_gid));
        body.insert("loadGid".to_string(), json!(self.load_gid));
        body.insert("chargerOn".to_string(), json!(self.charger_on));
        body.insert("chargingRate".to_string(), json!(self.charging_rate));
        body.insert("maxChargingRate".to_string(), json!(self.max_charging_rate));
        if let Some(pin) = self.breaker_pin.as_ref().filter(|pin| !pin.is_empty()) {
            body.insert("breakerPIN".to_string(), json!(pin));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelType {
    pub channel_type_gid: Option<i64>,
    pub description: Option<String>,
    pub selectable: Option<bool>,
}

impl Default for ChannelType {
    fn default() -> Self {
        Self {
            channel_type_gid: Some(0),
            description: Some(String::new()),
            selectable: Some(false),
        }
    }
}

wire_fields! {
    fn apply_fields for ChannelType {
        "channelTypeGid" => channel_type_gid: int,
        "description" => description: text,
        "selectable" => selectable: flag,
    }
}

impl ChannelType {
    pub fn from_json(json: &Value) -> Self {
        let mut channel_type = Self::default();
        channel_type.apply_fields(json);
        channel_type
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub vehicle_gid: Option<i64>,
    pub vendor: Option<String>,
    pub api_id: Option<String>,
    pub display_name: Option<String>,
    pub load_gid: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
}

impl Default for Vehicle {
    fn default() -> Self {
        Self {
            vehicle_gid: Some(0),
            vendor: Some(String::new()),
            api_id: Some(String::new()),
            display_name: Some(String::new()),
            load_gid: Some(String::new()),
            make: Some(String::new()),
            model: Some(String::new()),
            year: Some(0),
        }
    }
}

wire_fields! {
    fn apply_fields for Vehicle {
        "vehicleGid" => vehicle_gid: int,
        "vendor" => vendor: text,
        "apiId" => api_id: text,
        "displayName" => display_name: text,
        "loadGid" => load_gid: text,
        "make" => make: text,
        "model" => model: text,
        "year" => year: int,
    }
}

impl Vehicle {
    pub fn from_json(json: &Value) -> Self {
        let mut vehicle = Self::default();
        vehicle.apply_fields(json);
        vehicle
    }

    pub fn as_json(&self) -> Value {
        json!({
            "vehicleGid": self.vehicle_gid,
            "vendor": self.vendor,
            "apiId": self.api_id,
            "displayName": self.display_name,
            "loadGid": self.load_gid,
            "make": self.make,
            "model": self.model,
            "year": self.year,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleStatus {
    pub vehicle_gid: Option<i64>,
    pub vehicle_state: Option<String>,
    pub battery_level: Option<i64>,
    pub battery_range: Option<i64>,
    pub charging_state: Option<String>,
    pub charge_limit_percent: Option<i64>,
    pub minutes_to_full_charge: Option<i64>,
    pub charge_current_request: Option<i64>,
    pub charge_current_request_max: Option<i64>,
}

impl Default for VehicleStatus {
    fn default() -> Self {
        Self {
            vehicle_gid: Some(0),
            vehicle_state: Some(String::new()),
            battery_level: Some(0),
            battery_range: Some(0),
            charging_state: Some(String::new()),
            charge_limit_percent: Some(0),
            minutes_to_full_charge: Some(0),
            charge_current_request: Some(0),
            charge_current_request_max: Some(0),
        }
    }
}

wire_fields! {
    fn apply_fields for VehicleStatus {
        "vehicleGid" => vehicle_gid: int,
        "vehicleState" => vehicle_state: text,
        "batteryLevel" => battery_level: int,
        "batteryRange" => battery_range: int,
        "chargingState" => charging_state: text,
        "chargeLimitPercent" => charge_limit_percent: int,
        "minutesToFullCharge" => minutes_to_full_charge: int,
        "chargeCurrentRequest" => charge_current_request: int,
        "chargeCurrentRequestMax" => charge_current_request_max: int,
    }
}

impl VehicleStatus {
    /// Accepts the `{"settings": {...}}` envelope or the bare settings object.
    pub fn from_json(json: &Value) -> Self {
        let settings = json.get("settings").unwrap_or(json);
        let mut status = Self::default();
        status.apply_fields(settings);
        status
    }

    pub fn as_json(&self) -> Value {
        json!({
            "vehicleGid": self.vehicle_gid,
            "vehicleState": self.vehicle_state,
            "batteryLevel": self.battery_level,
            "batteryRange": self.battery_range,
            "chargingState": self.charging_state,
            "chargeLimitPercent": self.charge_limit_percent,
            "minutesToFullCharge": self.minutes_to_full_charge,
            "chargeCurrentRequest": self.charge_current_request,
            "chargeCurrentRequestMax": self.charge_current_request_max,
        })
    }
}

/// Account holder.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub customer_gid: Option<i64>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            customer_gid: Some(0),
            email: Some(String::new()),
            first_name: Some(String::new()),
            last_name: Some(String::new()),
            created_at: Some(epoch()),
        }
    }
}

wire_fields! {
    fn apply_fields for Customer {
        "customerGid" => customer_gid: int,
        "email" => email: text,
        "firstName" => first_name: text,
        "lastName" => last_name: text,
        "createdAt" => created_at: timestamp,
    }
}

impl Customer {
    pub fn new(customer_gid: i64, email: impl Into<String>) -> Self {
        Self {
            customer_gid: Some(customer_gid),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let mut customer = Self::default();
        customer.merge_json(json);
        customer
    }

    pub fn merge_json(&mut self, json: &Value) -> &mut Self {
        self.apply_fields(json);
        self
    }
}
