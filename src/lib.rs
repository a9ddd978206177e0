//! Client for the Emporia energy monitoring cloud service.
//!
//! [`VueClient`] exposes one method per REST resource. Calls go through a
//! [`Requester`], which keeps the identity tokens fresh, re-authenticates once
//! on a 401 and backs off on server errors.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
mod mapping;
pub mod models;
pub mod report;
pub mod retry;
pub mod simulator;
pub mod tokens;
pub mod types;
pub mod verifier;

pub use auth::{AuthenticatedRequester, Requester};
pub use client::{format_time, VueClient};
pub use config::{ClientConfig, StoredTokens, TokenFile};
pub use error::{Error, Result, VerificationError};
pub use identity::{CognitoIdentityProvider, IdentityProvider, IdentitySettings};
pub use mapping::parse_timestamp;
pub use models::{
    ChannelType, ChargerDevice, Customer, OutletDevice, Vehicle, VehicleStatus, VueDevice,
    VueDeviceChannel, VueDeviceChannelUsage, VueUsageDevice,
};
pub use report::EvChargingReport;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use simulator::SimulatedRequester;
pub use tokens::{TokenRefreshCallback, TokenStore};
pub use types::{Credentials, Scale, TokenSet, Unit};
pub use verifier::{Claims, TokenVerifier};
