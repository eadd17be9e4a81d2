//! Alarm module to handle the daily ON intervals of a relay

use std::fmt;

use thiserror::Error;

/// Number of minutes in a day
pub const MINUTES_IN_DAY: u16 = 1440;

/// AlarmError representing a rejected alarm configuration
#[derive(Error, Debug, Copy, Clone, PartialEq)]
pub enum AlarmError {
    /// A boundary is outside the day (and is not the open `-1` sentinel)
    #[error("minute {0} is outside the day")]
    OutsideDay(i32),
    /// The start of an interval does not come before its end
    #[error("start {0} is not before end {1}")]
    Inverted(u16, u16),
    /// The second alarm begins before the first one is over
    #[error("second alarm starting at {0} overlaps the first one ending at {1}")]
    Overlap(u16, u16),
    /// The relay id is not registered in the bank
    #[error("unknown relay {0}")]
    UnknownRelay(usize),
}

/// Enum to define one boundary of an alarm interval
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AlarmBound {
    /// Boundary at a minute of the day, in `[0, 1440)`
    At(u16),
    /// Open boundary, the interval starts at midnight or never ends
    Open,
}

impl AlarmBound {
    /// Method to parse a boundary from the signed minute convention (`-1` is open)
    fn from_minute(minute: i32) -> Result<AlarmBound, AlarmError> {
        match minute {
            -1 => Ok(AlarmBound::Open),
            minute if (0..i32::from(MINUTES_IN_DAY)).contains(&minute) => {
                Ok(AlarmBound::At(minute as u16))
            }
            minute => Err(AlarmError::OutsideDay(minute)),
        }
    }

    /// Getter of the minute of the boundary, `None` when it is open
    pub fn minute(&self) -> Option<u16> {
        match self {
            AlarmBound::At(minute) => Some(*minute),
            AlarmBound::Open => None,
        }
    }
}

impl fmt::Display for AlarmBound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlarmBound::At(minute) => write!(f, "{}", format_minute(*minute)),
            AlarmBound::Open => write!(f, "open"),
        }
    }
}

/// Structure to define one daily ON interval of a relay, covering `[start, end)`
///
/// ```
/// use rs_minuterie::alarm::AlarmInterval;
///
/// let night = AlarmInterval::from_minutes(22 * 60, -1).unwrap().unwrap();
/// assert!(night.contains(23 * 60));
/// assert!(!night.contains(21 * 60));
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AlarmInterval {
    start: AlarmBound,
    end: AlarmBound,
}

impl AlarmInterval {
    /// Method to build an interval from the signed minute convention of the
    /// configuration API. `-1` opens a boundary, and `(-1, -1)` means no
    /// interval at all (`Ok(None)`). When both boundaries are concrete the
    /// start has to come strictly before the end.
    pub fn from_minutes(start: i32, end: i32) -> Result<Option<AlarmInterval>, AlarmError> {
        let start = AlarmBound::from_minute(start)?;
        let end = AlarmBound::from_minute(end)?;
        if let (AlarmBound::At(start), AlarmBound::At(end)) = (start, end) {
            if start >= end {
                return Err(AlarmError::Inverted(start, end));
            }
        }
        if (AlarmBound::Open, AlarmBound::Open) == (start, end) {
            return Ok(None);
        }
        Ok(Some(AlarmInterval { start, end }))
    }

    /// Getter of the start boundary
    pub fn start(&self) -> AlarmBound {
        self.start
    }

    /// Getter of the end boundary
    pub fn end(&self) -> AlarmBound {
        self.end
    }

    /// Method to check if the interval covers the given minute of the day.
    /// An open start covers from midnight, an open end covers to midnight.
    pub fn contains(&self, minute: u16) -> bool {
        match (self.start, self.end) {
            (AlarmBound::At(start), AlarmBound::At(end)) => (start..end).contains(&minute),
            (AlarmBound::At(start), AlarmBound::Open) => minute >= start,
            (AlarmBound::Open, AlarmBound::At(end)) => minute < end,
            (AlarmBound::Open, AlarmBound::Open) => true,
        }
    }
}

impl fmt::Display for AlarmInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "start {}, end {}", self.start, self.end)
    }
}

/// Enum to select one of the two alarm slots of a relay
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AlarmNumber {
    /// First daily interval
    One = 1,
    /// Second daily interval, after the first one
    Two,
}

/// Function to format a minute of the day as `h.mm (total)` for the schedule dumps
pub(crate) fn format_minute(minute: u16) -> String {
    format!("{}.{:02} ({})", minute / 60, minute % 60, minute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_from_minutes() {
        let interval = AlarmInterval::from_minutes(480, 630).unwrap().unwrap();
        assert_eq!(AlarmBound::At(480), interval.start());
        assert_eq!(AlarmBound::At(630), interval.end());

        let open_end = AlarmInterval::from_minutes(1410, -1).unwrap().unwrap();
        assert_eq!(AlarmBound::At(1410), open_end.start());
        assert_eq!(AlarmBound::Open, open_end.end());

        assert_eq!(None, AlarmInterval::from_minutes(-1, -1).unwrap());
    }

    #[test]
    fn interval_rejections() {
        assert_eq!(
            Err(AlarmError::OutsideDay(1440)),
            AlarmInterval::from_minutes(0, 1440)
        );
        assert_eq!(
            Err(AlarmError::OutsideDay(-2)),
            AlarmInterval::from_minutes(-2, 100)
        );
        assert_eq!(
            Err(AlarmError::Inverted(200, 100)),
            AlarmInterval::from_minutes(200, 100)
        );
        assert_eq!(
            Err(AlarmError::Inverted(100, 100)),
            AlarmInterval::from_minutes(100, 100)
        );
    }

    #[test]
    fn interval_contains() {
        let concrete = AlarmInterval::from_minutes(100, 200).unwrap().unwrap();
        assert!(!concrete.contains(99));
        assert!(concrete.contains(100));
        assert!(concrete.contains(199));
        assert!(!concrete.contains(200));

        let open_end = AlarmInterval::from_minutes(300, -1).unwrap().unwrap();
        assert!(!open_end.contains(299));
        assert!(open_end.contains(300));
        assert!(open_end.contains(1439));

        let open_start = AlarmInterval::from_minutes(-1, 300).unwrap().unwrap();
        assert!(open_start.contains(0));
        assert!(open_start.contains(299));
        assert!(!open_start.contains(300));
    }

    #[test]
    fn minute_formatting() {
        assert_eq!("8.05 (485)", format_minute(485));
        assert_eq!("0.00 (0)", format_minute(0));
        assert_eq!("23.59 (1439)", format_minute(1439));
        assert_eq!(
            "start 8.00 (480), end open",
            AlarmInterval::from_minutes(480, -1)
                .unwrap()
                .unwrap()
                .to_string()
        );
    }
}
