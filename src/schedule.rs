use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// Cron-subset rule (`min hour dom mon dow`) used for scheduled balance
/// top-ups. Fields accept `*`, a number, or a comma list of numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronRule {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CronField {
    Any,
    Values(Vec<u32>),
}

impl CronField {
    fn parse(raw: &str, min: u32, max: u32, name: &str) -> Result<Self> {
        if raw == "*" {
            return Ok(CronField::Any);
        }
        let mut values = Vec::new();
        for part in raw.split(',') {
            let value: u32 = part
                .trim()
                .parse()
                .map_err(|_| anyhow!("cron field {} must be numeric (value: {})", name, part))?;
            if value < min || value > max {
                return Err(anyhow!(
                    "cron field {} must be within {}..={} (value: {})",
                    name,
                    min,
                    max,
                    value
                ));
            }
            values.push(value);
        }
        values.sort_unstable();
        values.dedup();
        Ok(CronField::Values(values))
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Values(values) => values.binary_search(&value).is_ok(),
        }
    }
}

impl CronRule {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(anyhow!(
                "cron rule must have 5 fields `min hour dom mon dow` (value: {})",
                expr
            ));
        }
        Ok(Self {
            minute: CronField::parse(fields[0], 0, 59, "minute")?,
            hour: CronField::parse(fields[1], 0, 23, "hour")?,
            day_of_month: CronField::parse(fields[2], 1, 31, "day-of-month")?,
            month: CronField::parse(fields[3], 1, 12, "month")?,
            day_of_week: CronField::parse(fields[4], 0, 6, "day-of-week")?,
        })
    }

    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        self.minute.matches(instant.minute())
            && self.hour.matches(instant.hour())
            && self.day_of_month.matches(instant.day())
            && self.month.matches(instant.month())
            && self
                .day_of_week
                .matches(instant.weekday().num_days_from_sunday())
    }

    /// All trigger instants within the half-open window `[from, to)`,
    /// ascending. A pure function of the rule and the window.
    pub fn trigger_instants(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut triggers = Vec::new();
        let mut cursor = match ceil_to_minute(from) {
            Some(aligned) => aligned,
            None => return triggers,
        };
        while cursor < to {
            if self.matches(cursor) {
                triggers.push(cursor);
            }
            cursor += Duration::minutes(1);
        }
        triggers
    }
}

fn ceil_to_minute(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let seconds = instant.timestamp();
    let remainder = seconds.rem_euclid(60);
    let aligned = if remainder == 0 && instant.timestamp_subsec_nanos() == 0 {
        seconds
    } else {
        seconds - remainder + 60
    };
    DateTime::from_timestamp(aligned, 0)
}
