// FleetCrab - GPL-3.0-or-later
// This file is part of FleetCrab.
//
// Copyright (C) 2025 The FleetCrab Authors
//
// FleetCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// FleetCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with FleetCrab.  If not, see <https://www.gnu.org/licenses/>.

//! Display timezone handling.
//!
//! All timestamps are stored in UTC. A [`DisplayClock`] maps them onto one of
//! a fixed set of zones for presentation. There is no DST logic: every zone
//! is a constant offset, and switching zones is an explicit recomputation
//! over already-loaded records (see `SourceCollection::retime`).

use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed-offset display zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DisplayClock {
    #[default]
    Utc,
    EasternDaylight,
    EasternStandard,
    CentralDaylight,
    CentralStandard,
    MountainDaylight,
    MountainStandard,
    PacificDaylight,
    PacificStandard,
}

impl DisplayClock {
    pub const ALL: [Self; 9] = [
        Self::Utc,
        Self::EasternDaylight,
        Self::EasternStandard,
        Self::CentralDaylight,
        Self::CentralStandard,
        Self::MountainDaylight,
        Self::MountainStandard,
        Self::PacificDaylight,
        Self::PacificStandard,
    ];

    /// Offset from UTC in whole hours.
    #[must_use]
    pub const fn offset_hours(self) -> i32 {
        match self {
            Self::Utc => 0,
            Self::EasternDaylight => -4,
            Self::EasternStandard | Self::CentralDaylight => -5,
            Self::CentralStandard | Self::MountainDaylight => -6,
            Self::MountainStandard | Self::PacificDaylight => -7,
            Self::PacificStandard => -8,
        }
    }

    /// Short zone name appended to rendered timestamps.
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Utc => "UTC",
            Self::EasternDaylight => "EDT",
            Self::EasternStandard => "EST",
            Self::CentralDaylight => "CDT",
            Self::CentralStandard => "CST",
            Self::MountainDaylight => "MDT",
            Self::MountainStandard => "MST",
            Self::PacificDaylight => "PDT",
            Self::PacificStandard => "PST",
        }
    }

    /// Human-readable label, e.g. `Eastern (EDT)`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Utc => "UTC",
            Self::EasternDaylight => "Eastern (EDT)",
            Self::EasternStandard => "Eastern (EST)",
            Self::CentralDaylight => "Central (CDT)",
            Self::CentralStandard => "Central (CST)",
            Self::MountainDaylight => "Mountain (MDT)",
            Self::MountainStandard => "Mountain (MST)",
            Self::PacificDaylight => "Pacific (PDT)",
            Self::PacificStandard => "Pacific (PST)",
        }
    }

    fn fixed_offset(self) -> FixedOffset {
        // Offsets are all within +-8h, so this never falls back.
        FixedOffset::east_opt(self.offset_hours() * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// Shift a UTC instant into this zone.
    #[must_use]
    pub fn localize(self, ts: DateTime<Utc>) -> DateTime<FixedOffset> {
        ts.with_timezone(&self.fixed_offset())
    }

    /// `YYYY-MM-DD HH:MM:SS ABBR`
    #[must_use]
    pub fn render(self, ts: DateTime<Utc>) -> String {
        format!(
            "{} {}",
            self.localize(ts).format("%Y-%m-%d %H:%M:%S"),
            self.abbreviation()
        )
    }

    /// `HH:MM:SS ABBR`, used in compact listings.
    #[must_use]
    pub fn render_time(self, ts: DateTime<Utc>) -> String {
        format!(
            "{} {}",
            self.localize(ts).format("%H:%M:%S"),
            self.abbreviation()
        )
    }
}

impl fmt::Display for DisplayClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a zone name matches neither a label nor an abbreviation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown display timezone '{0}'")]
pub struct UnknownTimezone(pub String);

impl FromStr for DisplayClock {
    type Err = UnknownTimezone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|clock| {
                clock.label().eq_ignore_ascii_case(wanted)
                    || clock.abbreviation().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnknownTimezone(s.to_string()))
    }
}

impl TryFrom<String> for DisplayClock {
    type Error = UnknownTimezone;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DisplayClock> for String {
    fn from(clock: DisplayClock) -> Self {
        clock.label().to_string()
    }
}

/// Render a duration the way operators read spans: `[D day(s), ]H:MM:SS[.ffffff]`.
#[must_use]
pub fn format_span(span: TimeDelta) -> String {
    let (sign, span) = if span < TimeDelta::zero() {
        ("-", -span)
    } else {
        ("", span)
    };

    let total_secs = span.num_seconds();
    let micros = span.subsec_nanos() / 1000;
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::from(sign);
    if days == 1 {
        out.push_str("1 day, ");
    } else if days > 1 {
        out.push_str(&format!("{days} days, "));
    }
    out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if micros > 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}
