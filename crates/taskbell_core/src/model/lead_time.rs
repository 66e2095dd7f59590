//! Reminder lead times.
//!
//! The set is closed: reminders can only fire at one of the offsets below.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const MS_PER_MINUTE: i64 = 60_000;

/// Offset before a deadline at which a reminder fires.
///
/// Serialized as its minute count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum LeadTime {
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    ThreeHours,
    SixHours,
}

impl LeadTime {
    /// All supported lead times, shortest first.
    pub const ALL: [LeadTime; 8] = [
        Self::FiveMinutes,
        Self::TenMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
        Self::ThreeHours,
        Self::SixHours,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            Self::FiveMinutes => 5,
            Self::TenMinutes => 10,
            Self::FifteenMinutes => 15,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::TwoHours => 120,
            Self::ThreeHours => 180,
            Self::SixHours => 360,
        }
    }

    pub fn as_millis(self) -> i64 {
        i64::from(self.minutes()) * MS_PER_MINUTE
    }

    /// Parses a minute count; only the enumerated offsets are accepted.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lead| lead.minutes() == minutes)
    }

    /// Human-readable label used in notification bodies.
    pub fn label(self) -> &'static str {
        match self {
            Self::FiveMinutes => "5 minutes",
            Self::TenMinutes => "10 minutes",
            Self::FifteenMinutes => "15 minutes",
            Self::ThirtyMinutes => "30 minutes",
            Self::OneHour => "1 hour",
            Self::TwoHours => "2 hours",
            Self::ThreeHours => "3 hours",
            Self::SixHours => "6 hours",
        }
    }
}

/// Rejected lead-time minute count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedLeadTime(pub u32);

impl Display for UnsupportedLeadTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported lead time {} minutes; expected 5|10|15|30|60|120|180|360",
            self.0
        )
    }
}

impl Error for UnsupportedLeadTime {}

impl TryFrom<u32> for LeadTime {
    type Error = UnsupportedLeadTime;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_minutes(value).ok_or(UnsupportedLeadTime(value))
    }
}

impl From<LeadTime> for u32 {
    fn from(value: LeadTime) -> Self {
        value.minutes()
    }
}
