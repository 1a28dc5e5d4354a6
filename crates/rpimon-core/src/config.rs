//! Defaults and value parsers shared by `rpimond` and `rpimon-ctl`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default sampling period in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 5;
/// Default command channel bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0:31337";
/// Default command channel port, used by the control client.
pub const DEFAULT_PORT: u16 = 31337;
/// Default pre-shared key.
pub const DEFAULT_KEY: u32 = 0x0102_0304;
/// Default eviction threshold, percent of aggregate CPU ticks.
pub const DEFAULT_THRESHOLD_PERCENT: u8 = 90;
/// Highest accepted eviction threshold.
pub const MAX_THRESHOLD_PERCENT: u8 = 99;
/// Default digital lines exposed over the command channel.
pub const DEFAULT_LINES: &str = "0-10,15-29";
/// Default per-connection read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;
/// Default number of concurrent command sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 4;
/// Default directory for published artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp";

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("threshold percent {0} out of range 0-{max}", max = MAX_THRESHOLD_PERCENT)]
    ThresholdOutOfRange(u32),
    #[error("invalid threshold {0:?}")]
    InvalidThreshold(String),
    #[error("invalid line set {input:?}: {reason}")]
    InvalidLineSet { input: String, reason: String },
    #[error("invalid key {0:?}: expected hex (0x...) or decimal u32")]
    InvalidKey(String),
}

/// Parses an eviction threshold in `0..=99`.
pub fn parse_threshold(s: &str) -> Result<u8, ConfigError> {
    let value: u32 = s
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidThreshold(s.to_string()))?;
    if value > MAX_THRESHOLD_PERCENT as u32 {
        return Err(ConfigError::ThresholdOutOfRange(value));
    }
    Ok(value as u8)
}

/// Parses a pre-shared key given as `0x`-prefixed hex or decimal.
pub fn parse_key(s: &str) -> Result<u32, ConfigError> {
    let t = s.trim();
    let parsed = match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => t.parse::<u32>(),
    };
    parsed.map_err(|_| ConfigError::InvalidKey(s.to_string()))
}

/// Set of digital line numbers the command channel may drive.
#[derive(Clone, PartialEq, Eq)]
pub struct LineSet {
    // bit N set = line N available; line numbers are u8 on the wire
    bits: [u64; 4],
}

impl LineSet {
    pub fn empty() -> Self {
        Self { bits: [0; 4] }
    }

    /// Parses ranges such as `0-10,15-29` or `4,17,27`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidLineSet {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        let number = |s: &str| -> Result<u8, ConfigError> {
            s.trim()
                .parse::<u8>()
                .map_err(|_| invalid(&format!("{:?} is not a line number 0-255", s.trim())))
        };

        let mut set = Self::empty();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (lo, hi) = match part.split_once('-') {
                Some((a, b)) => (number(a)?, number(b)?),
                None => {
                    let n = number(part)?;
                    (n, n)
                }
            };
            if lo > hi {
                return Err(invalid(&format!("range {}-{} is reversed", lo, hi)));
            }
            for line in lo..=hi {
                set.insert(line);
            }
        }

        if set.is_empty() {
            return Err(invalid("no lines given"));
        }
        Ok(set)
    }

    pub fn insert(&mut self, line: u8) {
        self.bits[(line / 64) as usize] |= 1u64 << (line % 64);
    }

    pub fn contains(&self, line: u8) -> bool {
        self.bits[(line / 64) as usize] & (1u64 << (line % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(|l| self.contains(*l))
    }
}

impl Default for LineSet {
    fn default() -> Self {
        let mut set = Self::empty();
        for line in (0..=10).chain(15..=29) {
            set.insert(line);
        }
        set
    }
}

impl FromStr for LineSet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Renders back in compact range form, e.g. `0-10,15-29`.
impl fmt::Display for LineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<u8> = self.iter().collect();
        let mut first = true;
        let mut i = 0;
        while i < lines.len() {
            let start = lines[i];
            let mut end = start;
            while i + 1 < lines.len() && lines[i + 1] == end.wrapping_add(1) {
                i += 1;
                end = lines[i];
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, end)?;
            }
            i += 1;
        }
        Ok(())
    }
}

impl fmt::Debug for LineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineSet({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("0").unwrap(), 0);
        assert_eq!(parse_threshold("90").unwrap(), 90);
        assert_eq!(parse_threshold("99").unwrap(), 99);
        assert_eq!(
            parse_threshold("100"),
            Err(ConfigError::ThresholdOutOfRange(100))
        );
        assert!(matches!(
            parse_threshold("-1"),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("0x01020304").unwrap(), DEFAULT_KEY);
        assert_eq!(parse_key("0X0102_0304").unwrap(), DEFAULT_KEY);
        assert_eq!(parse_key("16909060").unwrap(), DEFAULT_KEY);
        assert!(parse_key("0x1_0000_0000").is_err());
        assert!(parse_key("secret").is_err());
    }

    #[test]
    fn test_default_line_set() {
        let set = LineSet::default();
        assert_eq!(set, LineSet::parse(DEFAULT_LINES).unwrap());
        assert_eq!(set.len(), 26);
        assert!(set.contains(0));
        assert!(set.contains(10));
        assert!(!set.contains(11));
        assert!(!set.contains(14));
        assert!(set.contains(15));
        assert!(set.contains(29));
        assert!(!set.contains(30));
    }

    #[test]
    fn test_line_set_display() {
        assert_eq!(LineSet::default().to_string(), "0-10,15-29");
        assert_eq!(LineSet::parse("4, 17,27").unwrap().to_string(), "4,17,27");
        assert_eq!(LineSet::parse("255").unwrap().to_string(), "255");
    }

    #[test]
    fn test_line_set_rejects() {
        assert!(LineSet::parse("").is_err());
        assert!(LineSet::parse("5-2").is_err());
        assert!(LineSet::parse("0-256").is_err());
        assert!(LineSet::parse("a-b").is_err());
    }
}
