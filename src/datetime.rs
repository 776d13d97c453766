//! Date/time utilities for modhost.

use std::fmt::{self, Display, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_tz::Tz;

/// Format a DateTime<Utc> in the given timezone.
///
/// An empty timezone means the host's local time. An unknown timezone name
/// falls back to UTC. A format string chrono cannot render yields an error.
pub fn format_utc_datetime(
    dt: &DateTime<Utc>,
    timezone: &str,
    format: &str,
) -> Result<String, fmt::Error> {
    if timezone.is_empty() {
        return render(&dt.with_timezone(&Local), format);
    }
    match timezone.parse::<Tz>() {
        Ok(tz) => render(&dt.with_timezone(&tz), format),
        Err(_) => render(dt, format),
    }
}

fn render<Z: TimeZone>(dt: &DateTime<Z>, format: &str) -> Result<String, fmt::Error>
where
    Z::Offset: Display,
{
    let mut out = String::new();
    write!(out, "{}", dt.format(format))?;
    Ok(out)
}

/// Format the current time in the given timezone.
pub fn format_now(timezone: &str, format: &str) -> Result<String, fmt::Error> {
    format_utc_datetime(&Utc::now(), timezone, format)
}

/// Check whether chrono accepts every specifier in a strftime format.
pub fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Check whether a timezone name is usable (empty means local time).
pub fn is_valid_timezone(timezone: &str) -> bool {
    timezone.is_empty() || timezone.parse::<Tz>().is_ok()
}
