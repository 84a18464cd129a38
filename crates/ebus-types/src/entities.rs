//! # Identity Entities
//!
//! The identity side of the event model:
//!
//! - **Subsystem**: the closed set of telescope subsystems
//! - **Prefix**: `SUBSYSTEM.component`, the source of an event
//! - **EventName**: free-form (possibly dotted) name within a prefix
//! - **EventKey**: `SUBSYSTEM.component.eventName`, the channel identity
//!
//! Canonical strings are the only identity: two keys are equal iff their
//! canonical strings are equal.

use crate::errors::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the parts of a prefix or key.
pub const KEY_SEPARATOR: char = '.';

macro_rules! subsystems {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Telescope subsystems that may own components.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Subsystem {
            $(
                #[doc = $name]
                $variant,
            )+
        }

        impl Subsystem {
            /// Every known subsystem, in declaration order.
            pub const ALL: &'static [Subsystem] = &[$(Subsystem::$variant),+];

            /// Canonical name as it appears in prefixes and keys.
            #[must_use]
            pub fn name(&self) -> &'static str {
                match self {
                    $(Subsystem::$variant => $name,)+
                }
            }
        }
    };
}

subsystems! {
    Aoesw => "AOESW",
    Aps => "APS",
    Cis => "CIS",
    Cln => "CLN",
    Cryo => "CRYO",
    Csw => "CSW",
    Dms => "DMS",
    Dps => "DPS",
    Enc => "ENC",
    Esen => "ESEN",
    Esw => "ESW",
    Hndl => "HNDL",
    Hq => "HQ",
    Iris => "IRIS",
    Lgsf => "LGSF",
    M1coat => "M1COAT",
    M1cs => "M1CS",
    M1s => "M1S",
    M2coat => "M2COAT",
    M2s => "M2S",
    M3s => "M3S",
    Modhis => "MODHIS",
    Nfiraos => "NFIRAOS",
    Oss => "OSS",
    Refr => "REFR",
    Scms => "SCMS",
    Ser => "SER",
    Soss => "SOSS",
    Str => "STR",
    Sum => "SUM",
    Tcs => "TCS",
    Tins => "TINS",
    Wfos => "WFOS",
    Container => "Container",
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subsystem {
    type Err = ModelError;

    /// Parsing is case-insensitive; the canonical form is restored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|subsystem| subsystem.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownSubsystem(s.to_string()))
    }
}

/// Source of an event: a subsystem plus a component name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Prefix {
    subsystem: Subsystem,
    component_name: String,
}

impl Prefix {
    /// Create a prefix, validating the component name.
    ///
    /// # Errors
    ///
    /// - `ModelError::InvalidComponentName` if the name is empty, padded
    ///   with whitespace, or contains the key separator.
    pub fn new(subsystem: Subsystem, component_name: impl Into<String>) -> Result<Self, ModelError> {
        let component_name = component_name.into();

        let reason = if component_name.is_empty() {
            Some("must not be empty")
        } else if component_name.trim() != component_name {
            Some("must not have leading or trailing whitespace")
        } else if component_name.contains(KEY_SEPARATOR) {
            Some("must not contain '.'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ModelError::InvalidComponentName {
                name: component_name,
                reason,
            }),
            None => Ok(Self {
                subsystem,
                component_name,
            }),
        }
    }

    /// Owning subsystem.
    #[must_use]
    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    /// Component name within the subsystem.
    #[must_use]
    pub fn component_name(&self) -> &str {
        &self.component_name
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.subsystem, KEY_SEPARATOR, self.component_name)
    }
}

impl FromStr for Prefix {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (subsystem, component) =
            s.split_once(KEY_SEPARATOR)
                .ok_or_else(|| ModelError::Malformed {
                    kind: "prefix",
                    value: s.to_string(),
                    expected: "SUBSYSTEM.component",
                })?;
        Prefix::new(subsystem.parse()?, component)
    }
}

/// Name of an event within a prefix. May contain dots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventName(String);

impl EventName {
    /// Create an event name.
    ///
    /// # Errors
    ///
    /// - `ModelError::EmptyEventName` for an empty name.
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::EmptyEventName);
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EventName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identity of a logical event channel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    source: Prefix,
    event_name: EventName,
}

impl EventKey {
    #[must_use]
    pub fn new(source: Prefix, event_name: EventName) -> Self {
        Self { source, event_name }
    }

    #[must_use]
    pub fn source(&self) -> &Prefix {
        &self.source
    }

    #[must_use]
    pub fn event_name(&self) -> &EventName {
        &self.event_name
    }

    #[must_use]
    pub fn subsystem(&self) -> Subsystem {
        self.source.subsystem()
    }

    /// Canonical string form, used for pattern matching and logging.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.source, KEY_SEPARATOR, self.event_name)
    }
}

impl FromStr for EventKey {
    type Err = ModelError;

    /// Splits on the first two separators; the remainder is the event name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ModelError::Malformed {
            kind: "event key",
            value: s.to_string(),
            expected: "SUBSYSTEM.component.eventName",
        };

        let mut parts = s.splitn(3, KEY_SEPARATOR);
        let subsystem = parts.next().ok_or_else(malformed)?;
        let component = parts.next().ok_or_else(malformed)?;
        let name = parts.next().ok_or_else(malformed)?;

        Ok(EventKey::new(
            Prefix::new(subsystem.parse()?, component)?,
            EventName::new(name)?,
        ))
    }
}
