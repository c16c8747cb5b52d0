//! Detection channels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DmsError;

/// An independent anomaly-detection category.
///
/// The set is closed so that per-channel state can live in a fixed array
/// instead of a string-keyed map. Adding a channel means adding a variant
/// here and extending [`Channel::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Eyes closing (eye-aspect ratio below threshold)
    Drowsiness,

    /// Mouth opening ratio above threshold
    Yawning,

    /// Phone visible in the cabin frame
    PhoneUse,
}

impl Channel {
    /// Every channel, in index order
    pub const ALL: [Channel; 3] = [Channel::Drowsiness, Channel::Yawning, Channel::PhoneUse];

    /// Number of channels
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this channel in [`Channel::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable machine name, used for storage and metrics labels
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Drowsiness => "drowsiness",
            Channel::Yawning => "yawning",
            Channel::PhoneUse => "phone_use",
        }
    }

    /// Human-readable name for reports and notifications
    pub fn label(self) -> &'static str {
        match self {
            Channel::Drowsiness => "Drowsiness",
            Channel::Yawning => "Yawning",
            Channel::PhoneUse => "Phone Usage",
        }
    }

    /// Short name used in alert messages
    pub fn alert_name(self) -> &'static str {
        match self {
            Channel::Drowsiness => "drowsiness",
            Channel::Yawning => "yawning",
            Channel::PhoneUse => "phone",
        }
    }

    /// Event details used when the signal source supplies none
    pub fn default_details(self) -> &'static str {
        match self {
            Channel::Drowsiness => "Eye aspect ratio below threshold",
            Channel::Yawning => "Mouth distance exceeded threshold",
            Channel::PhoneUse => "Mobile phone detected in frame",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = DmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drowsiness" => Ok(Channel::Drowsiness),
            "yawning" => Ok(Channel::Yawning),
            "phone_use" | "phone" => Ok(Channel::PhoneUse),
            other => Err(DmsError::UnknownChannel(other.to_string())),
        }
    }
}
