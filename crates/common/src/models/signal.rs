use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn emoji(&self) -> &'static str {
        match self {
            Direction::Long => "🟢",
            Direction::Short => "🔴",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Outcome of a fired evaluation. "No signal" is expressed as `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub direction: Direction,
    pub distance_ratio: f64,
    pub indicator_value: f64,
    pub close: f64,
}
