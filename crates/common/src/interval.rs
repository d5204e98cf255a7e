use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval string is empty")]
    Empty,
    #[error("interval '{0}' has no valid positive count")]
    InvalidCount(String),
    #[error("interval '{0}' has an unknown unit")]
    UnknownUnit(String),
}

/// Seconds per interval unit. A month is 30 days and a year 365 days.
fn seconds_per_unit(unit: char) -> Option<u64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3_600),
        'd' => Some(86_400),
        'w' => Some(604_800),
        'M' => Some(2_592_000),
        'y' => Some(31_536_000),
        _ => None,
    }
}

/// Converts an interval such as `15m`, `4h` or `1M` into seconds.
pub fn to_seconds(interval: &str) -> Result<u64, IntervalError> {
    let interval = interval.trim();
    let unit = interval.chars().last().ok_or(IntervalError::Empty)?;
    let per_unit =
        seconds_per_unit(unit).ok_or_else(|| IntervalError::UnknownUnit(interval.to_string()))?;

    let count: u64 = interval[..interval.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| IntervalError::InvalidCount(interval.to_string()))?;
    if count == 0 {
        return Err(IntervalError::InvalidCount(interval.to_string()));
    }

    count
        .checked_mul(per_unit)
        .ok_or_else(|| IntervalError::InvalidCount(interval.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_intervals() {
        assert_eq!(to_seconds("15m"), Ok(900));
        assert_eq!(to_seconds("1h"), Ok(3_600));
        assert_eq!(to_seconds("4h"), Ok(14_400));
        assert_eq!(to_seconds("1s"), Ok(1));
        assert_eq!(to_seconds("1d"), Ok(86_400));
        assert_eq!(to_seconds("1w"), Ok(604_800));
    }

    #[test]
    fn test_month_and_year_are_fixed_length() {
        assert_eq!(to_seconds("1M"), Ok(2_592_000));
        assert_eq!(to_seconds("1y"), Ok(31_536_000));
    }

    #[test]
    fn test_units_are_case_sensitive() {
        assert_eq!(to_seconds("1m"), Ok(60));
        assert_eq!(to_seconds("1M"), Ok(30 * 86_400));
        assert_eq!(
            to_seconds("1H"),
            Err(IntervalError::UnknownUnit("1H".to_string()))
        );
    }

    #[test]
    fn test_malformed_intervals() {
        assert_eq!(to_seconds(""), Err(IntervalError::Empty));
        assert_eq!(to_seconds("m"), Err(IntervalError::InvalidCount("m".to_string())));
        assert_eq!(to_seconds("0h"), Err(IntervalError::InvalidCount("0h".to_string())));
        assert_eq!(to_seconds("-1h"), Err(IntervalError::InvalidCount("-1h".to_string())));
        assert_eq!(to_seconds("15"), Err(IntervalError::UnknownUnit("15".to_string())));
    }
}
