//! Date range for bounding full-reconciliation listings.

use chrono::{DateTime, NaiveDate, Utc};

/// Date range for filtering events.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Parse optional bounds.
    /// Each bound is either YYYY-MM-DD (start/end of that day in UTC) or RFC3339.
    pub fn from_args(from: Option<&str>, to: Option<&str>) -> Result<Self, String> {
        let from = from.map(|s| parse_bound(s, BoundKind::Start)).transpose()?;
        let to = to.map(|s| parse_bound(s, BoundKind::End)).transpose()?;

        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(format!("time_min ({from}) is after time_max ({to})"));
            }
        }

        Ok(DateRange { from, to })
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

enum BoundKind {
    Start,
    End,
}

fn parse_bound(s: &str, kind: BoundKind) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}'. Expected YYYY-MM-DD or RFC3339", s))?;

    let time = match kind {
        BoundKind::Start => date.and_hms_opt(0, 0, 0),
        BoundKind::End => date.and_hms_opt(23, 59, 59),
    };

    time.map(|t| t.and_utc())
        .ok_or_else(|| format!("Invalid date '{}'", s))
}
