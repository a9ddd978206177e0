use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Snapshot of the tokens issued by the identity provider.
///
/// A set is never edited in place; every refresh produces a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenSet {
    pub fn new(
        access_token: impl Into<String>,
        id_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_type: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: id_token.into(),
            refresh_token: refresh_token.into(),
            token_type: token_type.into(),
        }
    }

    /// The constant set handed out in simulator mode.
    pub fn simulator() -> Self {
        Self {
            id_token: "simulator".to_string(),
            ..Self::default()
        }
    }

    /// True when no usable credential is present at all.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.id_token.is_empty() && self.refresh_token.is_empty()
    }
}

/// Username plus a single-use password.
///
/// The password is dropped as soon as it has been exchanged for tokens.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Error returned when parsing an unknown [`Scale`] or [`Unit`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value: {}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

/// Bucket size for usage queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scale {
    Second,
    Minute,
    Minutes15,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Scale {
    pub const ALL: [Scale; 8] = [
        Scale::Second,
        Scale::Minute,
        Scale::Minutes15,
        Scale::Hour,
        Scale::Day,
        Scale::Week,
        Scale::Month,
        Scale::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scale::Second => "1S",
            Scale::Minute => "1MIN",
            Scale::Minutes15 => "15MIN",
            Scale::Hour => "1H",
            Scale::Day => "1D",
            Scale::Week => "1W",
            Scale::Month => "1MON",
            Scale::Year => "1Y",
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scale {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scale::ALL
            .into_iter()
            .find(|scale| scale.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Unit in which usage values are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Volts,
    Kwh,
    Usd,
    AmpHours,
    Trees,
    Gas,
    Driven,
    Carbon,
}

impl Unit {
    pub const ALL: [Unit; 8] = [
        Unit::Volts,
        Unit::Kwh,
        Unit::Usd,
        Unit::AmpHours,
        Unit::Trees,
        Unit::Gas,
        Unit::Driven,
        Unit::Carbon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Volts => "Voltage",
            Unit::Kwh => "KilowattHours",
            Unit::Usd => "Dollars",
            Unit::AmpHours => "AmpHours",
            Unit::Trees => "Trees",
            Unit::Gas => "GallonsOfGas",
            Unit::Driven => "MilesDriven",
            Unit::Carbon => "Carbon",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}
