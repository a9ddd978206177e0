use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Per-day charging totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyChargingTotal {
    pub date: NaiveDate,
    #[serde(default)]
    pub energy_kwhs: f64,
    #[serde(default)]
    pub charging_cost: f64,
    #[serde(default)]
    pub savings: Option<f64>,
    #[serde(default)]
    pub potential_savings: Option<f64>,
}

/// Time the charger actually delivered energy within a plug-in session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingSession {
    pub interval: ReportInterval,
    #[serde(default)]
    pub energy_kwhs: f64,
    #[serde(default)]
    pub charging_cost: f64,
    #[serde(default)]
    pub savings: Option<f64>,
    #[serde(default)]
    pub potential_savings: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlugInSession {
    pub interval: ReportInterval,
    #[serde(default)]
    pub charging_sessions: Vec<ChargingSession>,
}

/// Charging summary for one charger over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvChargingReport {
    pub device_id: String,
    pub interval: ReportInterval,
    #[serde(default)]
    pub report_description: Option<String>,
    #[serde(default)]
    pub call_to_action_type: Option<String>,
    #[serde(default)]
    pub energy_kwhs: f64,
    #[serde(default)]
    pub charging_cost: f64,
    #[serde(default)]
    pub daily_charging_totals: Vec<DailyChargingTotal>,
    #[serde(default)]
    pub plug_in_sessions: Vec<PlugInSession>,
}
