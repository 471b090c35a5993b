//! Meeting patterns: weekdays, half-open time ranges, and the textual forms
//! the course data provider uses for them (`"MWF"`, `"9:30 AM - 10:20 AM"`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Minutes in a day; the largest valid range end.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Short token used in day patterns.
    pub fn token(self) -> &'static str {
        match self {
            Weekday::Mon => "M",
            Weekday::Tue => "T",
            Weekday::Wed => "W",
            Weekday::Thu => "Th",
            Weekday::Fri => "F",
            Weekday::Sat => "Sa",
            Weekday::Sun => "Su",
        }
    }
}

/// Set of weekdays a meeting occurs on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeetingDays(u8);

impl MeetingDays {
    pub const NONE: MeetingDays = MeetingDays(0);

    pub fn from_days(days: impl IntoIterator<Item = Weekday>) -> Self {
        days.into_iter().fold(Self::NONE, |acc, d| acc.with(d))
    }

    pub fn with(self, day: Weekday) -> Self {
        MeetingDays(self.0 | day.bit())
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & day.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn intersects(&self, other: &MeetingDays) -> bool {
        self.0 & other.0 != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        Weekday::ALL.into_iter().filter(move |d| self.contains(*d))
    }

    /// Parse a provider day pattern such as `"MWF"`, `"TTh"`, `"MTWThF"`,
    /// `"Sa"`, `"Thu"` or `"TBA"`. `R` is accepted for Thursday and `U` for
    /// Sunday.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let compact: Vec<char> = raw
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '/' | '.'))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let text: String = compact.iter().collect();
        if text.is_empty() || text == "TBA" || text == "ARRANGED" {
            return Ok(Self::NONE);
        }

        let mut days = Self::NONE;
        let mut i = 0;
        while i < compact.len() {
            let token = DAY_TOKENS.iter().find(|(token, _)| {
                let token: Vec<char> = token.chars().collect();
                compact[i..].starts_with(&token)
            });
            if let Some((token, day)) = token {
                days = days.with(*day);
                i += token.len();
                continue;
            }
            let day = match compact[i] {
                'M' => Weekday::Mon,
                'T' => Weekday::Tue,
                'W' => Weekday::Wed,
                'R' => Weekday::Thu,
                'F' => Weekday::Fri,
                'S' => Weekday::Sat,
                'U' => Weekday::Sun,
                _ => return Err(ValidationError::InvalidDays(raw.to_string())),
            };
            days = days.with(day);
            i += 1;
        }
        Ok(days)
    }
}

/// Multi-letter day tokens, longest first so `"THU"` is never read as
/// Thursday followed by Sunday.
const DAY_TOKENS: [(&str, Weekday); 14] = [
    ("THURS", Weekday::Thu),
    ("TUES", Weekday::Tue),
    ("THUR", Weekday::Thu),
    ("THU", Weekday::Thu),
    ("TUE", Weekday::Tue),
    ("MON", Weekday::Mon),
    ("WED", Weekday::Wed),
    ("FRI", Weekday::Fri),
    ("SAT", Weekday::Sat),
    ("SUN", Weekday::Sun),
    ("TH", Weekday::Thu),
    ("TU", Weekday::Tue),
    ("SA", Weekday::Sat),
    ("SU", Weekday::Sun),
];

impl fmt::Display for MeetingDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for day in self.iter() {
            f.write_str(day.token())?;
        }
        Ok(())
    }
}

impl fmt::Debug for MeetingDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MeetingDays({self})")
    }
}

impl FromStr for MeetingDays {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Half-open `[start, end)` range in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeRange {
    start: u16,
    end: u16,
}

impl TimeRange {
    /// # Errors
    /// Returns [`ValidationError::InvalidTimeRange`] unless `start < end <= 24:00`.
    pub fn new(start: u16, end: u16) -> Result<Self, ValidationError> {
        if start >= end || end > MINUTES_PER_DAY {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Convenience for `HH:MM` pairs.
    pub fn hm(start_h: u16, start_m: u16, end_h: u16, end_m: u16) -> Result<Self, ValidationError> {
        Self::new(start_h * 60 + start_m, end_h * 60 + end_m)
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end - self.start
    }

    /// Back-to-back ranges (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Parse `"9:30 AM - 10:20 AM"`, `"1:30-2:20 PM"` or `"13:30-14:20"`.
    ///
    /// When only the end carries a meridiem the start inherits it, unless
    /// that would put the start after the end (`"11:30-12:20 PM"`).
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.replace(['\u{2013}', '\u{2014}'], "-");
        let (left, right) = normalized
            .split_once('-')
            .ok_or_else(|| ValidationError::InvalidTime(raw.to_string()))?;
        let (start_clock, start_mer) = parse_clock(left)?;
        let (end_clock, end_mer) = parse_clock(right)?;

        let end = to_minutes(end_clock, end_mer, raw)?;
        let start = match (start_mer, end_mer) {
            (None, Some(mer)) => {
                let inherited = to_minutes(start_clock, Some(mer), raw)?;
                if inherited < end {
                    inherited
                } else {
                    to_minutes(start_clock, Some(Meridiem::Am), raw)?
                }
            }
            _ => to_minutes(start_clock, start_mer, raw)?,
        };
        Self::new(start, end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

impl FromStr for TimeRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

fn parse_clock(raw: &str) -> Result<((u16, u16), Option<Meridiem>), ValidationError> {
    let trimmed = raw.trim();
    let upper = trimmed.to_ascii_uppercase();
    let (body, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim().to_string(), Some(Meridiem::Am))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim().to_string(), Some(Meridiem::Pm))
    } else {
        (upper.clone(), None)
    };

    let invalid = || ValidationError::InvalidTime(trimmed.to_string());
    let (h, m) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => (body.as_str(), "0"),
    };
    let hour: u16 = h.trim().parse().map_err(|_| invalid())?;
    let minute: u16 = m.trim().parse().map_err(|_| invalid())?;
    if minute >= 60 {
        return Err(invalid());
    }
    Ok(((hour, minute), meridiem))
}

fn to_minutes((hour, minute): (u16, u16), meridiem: Option<Meridiem>, raw: &str) -> Result<u16, ValidationError> {
    let hour = match meridiem {
        Some(_) if hour == 0 || hour > 12 => {
            return Err(ValidationError::InvalidTime(raw.to_string()));
        }
        Some(Meridiem::Am) if hour == 12 => 0,
        Some(Meridiem::Pm) if hour != 12 => hour + 12,
        Some(_) => hour,
        None if hour > 24 => return Err(ValidationError::InvalidTime(raw.to_string())),
        None => hour,
    };
    Ok(hour * 60 + minute)
}

/// One meeting of a session: the days it happens on and its time range.
///
/// A meeting with no days or no time is "to be arranged" and never clashes
/// with anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMeeting", into = "RawMeeting")]
pub struct Meeting {
    pub days: MeetingDays,
    pub time: Option<TimeRange>,
    pub building: Option<String>,
    pub room: Option<String>,
}

impl Meeting {
    pub fn new(days: MeetingDays, time: TimeRange) -> Self {
        Self {
            days,
            time: Some(time),
            building: None,
            room: None,
        }
    }

    pub fn tba() -> Self {
        Self {
            days: MeetingDays::NONE,
            time: None,
            building: None,
            room: None,
        }
    }

    /// Parse the provider's textual `days` / `time` pair.
    pub fn parse(days: &str, time: &str) -> Result<Self, ValidationError> {
        let time = time.trim();
        let time = if time.is_empty() || time.eq_ignore_ascii_case("tba") {
            None
        } else {
            Some(TimeRange::parse(time)?)
        };
        Ok(Self {
            days: MeetingDays::parse(days)?,
            time,
            building: None,
            room: None,
        })
    }

    pub fn at(mut self, building: impl Into<String>, room: impl Into<String>) -> Self {
        self.building = Some(building.into());
        self.room = Some(room.into());
        self
    }

    pub fn is_tba(&self) -> bool {
        self.days.is_empty() || self.time.is_none()
    }

    pub fn overlaps(&self, other: &Meeting) -> bool {
        match (self.time, other.time) {
            (Some(a), Some(b)) => self.days.intersects(&other.days) && a.overlaps(&b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawMeeting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    days: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    building: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    room: Option<String>,
}

impl TryFrom<RawMeeting> for Meeting {
    type Error = ValidationError;

    fn try_from(raw: RawMeeting) -> Result<Self, Self::Error> {
        let mut meeting = Meeting::parse(
            raw.days.as_deref().unwrap_or_default(),
            raw.time.as_deref().unwrap_or_default(),
        )?;
        meeting.building = raw.building;
        meeting.room = raw.room;
        Ok(meeting)
    }
}

impl From<Meeting> for RawMeeting {
    fn from(meeting: Meeting) -> Self {
        RawMeeting {
            days: (!meeting.days.is_empty()).then(|| meeting.days.to_string()),
            time: meeting.time.map(|t| t.to_string()),
            building: meeting.building,
            room: meeting.room,
        }
    }
}
