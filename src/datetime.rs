//! OFX date/time values
//!
//! OFX writes instants as `YYYYMMDD[HHMM[SS[.fff]]][[offset[:TZ]]]`, e.g.
//! `20141201161144.000[-5:EST]`. The offset is optional and its absence is
//! kept distinct from an explicit UTC offset.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfxDateTime {
    /// Wall-clock value as written in the document.
    pub local: NaiveDateTime,
    /// Offset east of UTC in minutes; `None` when the document gave none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tz_name: Option<String>,
}

/// Reason a date/time string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeParseError(pub String);

impl fmt::Display for DateTimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl OfxDateTime {
    pub fn parse(text: &str) -> Result<Self, DateTimeParseError> {
        let text = text.trim();
        let (stamp, zone) = match text.find('[') {
            Some(open) => {
                let close = text[open..]
                    .find(']')
                    .map(|pos| open + pos)
                    .ok_or_else(|| DateTimeParseError("unterminated timezone bracket".into()))?;
                if close + 1 != text.len() {
                    return Err(DateTimeParseError("trailing characters after timezone".into()));
                }
                (&text[..open], Some(&text[open + 1..close]))
            }
            None => (text, None),
        };

        let (digits, fraction) = match stamp.find('.') {
            Some(dot) => (&stamp[..dot], Some(&stamp[dot + 1..])),
            None => (stamp, None),
        };

        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DateTimeParseError("non-digit characters in date".into()));
        }
        if !matches!(digits.len(), 8 | 12 | 14) {
            return Err(DateTimeParseError(format!(
                "expected 8, 12 or 14 digits, found {}",
                digits.len()
            )));
        }
        if fraction.is_some() && digits.len() != 14 {
            return Err(DateTimeParseError("fractional seconds without seconds".into()));
        }

        let field = |range: std::ops::Range<usize>| -> u32 {
            digits.get(range).and_then(|s| s.parse().ok()).unwrap_or(0)
        };
        let year = digits[..4]
            .parse::<i32>()
            .map_err(|_| DateTimeParseError("invalid year".into()))?;
        let date = NaiveDate::from_ymd_opt(year, field(4..6), field(6..8))
            .ok_or_else(|| DateTimeParseError("date out of range".into()))?;

        let nanos = match fraction {
            Some(frac) => parse_fraction(frac)?,
            None => 0,
        };
        let time = NaiveTime::from_hms_nano_opt(field(8..10), field(10..12), field(12..14), nanos)
            .ok_or_else(|| DateTimeParseError("time out of range".into()))?;

        let (utc_offset_minutes, tz_name) = match zone {
            Some(zone) => parse_zone(zone)?,
            None => (None, None),
        };

        Ok(OfxDateTime {
            local: NaiveDateTime::new(date, time),
            utc_offset_minutes,
            tz_name,
        })
    }

    pub fn has_offset(&self) -> bool {
        self.utc_offset_minutes.is_some()
    }

    pub fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60))
    }

    /// Offset-aware instant; `None` when the document did not specify an offset.
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = self.offset()?;
        offset.from_local_datetime(&self.local).single()
    }

    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        self.to_datetime().map(|dt| dt.with_timezone(&Utc))
    }

    /// Interpret an unzoned value with the caller's choice of offset.
    pub fn assume_offset(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        match self.offset() {
            Some(own) => own.from_local_datetime(&self.local).single(),
            None => offset.from_local_datetime(&self.local).single(),
        }
    }
}

fn parse_fraction(frac: &str) -> Result<u32, DateTimeParseError> {
    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DateTimeParseError("invalid fractional seconds".into()));
    }
    let mut padded: String = frac.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded
        .parse()
        .map_err(|_| DateTimeParseError("invalid fractional seconds".into()))
}

/// `-5:EST`, `+5.30:IST`, `0`, `:GMT`
fn parse_zone(zone: &str) -> Result<(Option<i32>, Option<String>), DateTimeParseError> {
    let (offset, name) = match zone.split_once(':') {
        Some((offset, name)) => (offset.trim(), Some(name.trim())),
        None => (zone.trim(), None),
    };
    let tz_name = name.filter(|n| !n.is_empty()).map(str::to_string);
    if offset.is_empty() {
        return Ok((None, tz_name));
    }

    let (sign, unsigned) = match offset.as_bytes()[0] {
        b'-' => (-1, &offset[1..]),
        b'+' => (1, &offset[1..]),
        _ => (1, offset),
    };
    let (hours, minutes) = match unsigned.split_once('.') {
        Some((h, m)) => (h, m),
        None => (unsigned, "0"),
    };
    let hours: i32 = hours
        .parse()
        .map_err(|_| DateTimeParseError(format!("invalid UTC offset {offset:?}")))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| DateTimeParseError(format!("invalid UTC offset {offset:?}")))?;
    if hours > 14 || minutes >= 60 {
        return Err(DateTimeParseError(format!("UTC offset {offset:?} out of range")));
    }
    Ok((Some(sign * (hours * 60 + minutes)), tz_name))
}

impl fmt::Display for OfxDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local.format("%Y%m%d%H%M%S%.3f"))?;
        if let Some(minutes) = self.utc_offset_minutes {
            let sign = if minutes < 0 { "-" } else { "+" };
            let abs = minutes.abs();
            write!(f, "[{}{}", sign, abs / 60)?;
            if abs % 60 != 0 {
                write!(f, ".{:02}", abs % 60)?;
            }
            if let Some(name) = &self.tz_name {
                write!(f, ":{name}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
