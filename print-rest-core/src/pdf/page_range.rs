//! Page range selectors with slice semantics.
//!
//! A selector is either a single zero-based page index (`3`, `-1`) or a
//! slice `start:stop[:step]` where every part is optional and negative
//! values count from the end. `""` and `":"` select the whole document.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageRangeError {
    #[error("invalid page range '{0}'")]
    Invalid(String),
    #[error("page range '{0}' has a zero step")]
    ZeroStep(String),
    #[error("page range '{0}' is out of range")]
    OutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageRange {
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
}

impl PageRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, PageRangeError> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(Self::all());
        }
        let invalid = || PageRangeError::Invalid(input.to_string());

        if !text.contains(':') {
            let index: i64 = text.parse().map_err(|_| invalid())?;
            // -1 is the last page; stop = index + 1 would be 0 and select nothing.
            let stop = match index {
                -1 => None,
                index => Some(
                    index
                        .checked_add(1)
                        .ok_or_else(|| PageRangeError::OutOfRange(input.to_string()))?,
                ),
            };
            return Ok(Self {
                start: Some(index),
                stop,
                step: None,
            });
        }

        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() > 3 {
            return Err(invalid());
        }
        let part = |i: usize| -> Result<Option<i64>, PageRangeError> {
            match parts.get(i).map(|p| p.trim()) {
                None | Some("") => Ok(None),
                Some(p) => p.parse().map(Some).map_err(|_| invalid()),
            }
        };
        let range = Self {
            start: part(0)?,
            stop: part(1)?,
            step: part(2)?,
        };
        if range.step == Some(0) {
            return Err(PageRangeError::ZeroStep(input.to_string()));
        }
        Ok(range)
    }

    pub fn is_all(&self) -> bool {
        self.start.is_none() && self.stop.is_none() && self.step.map_or(true, |s| s == 1)
    }

    /// Zero-based page indices selected from a document of `len` pages,
    /// in selection order.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let len = len as i64;
        let step = self.step.unwrap_or(1);
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
        let clamp = |value: Option<i64>, default: i64| match value {
            None => default,
            Some(v) if v < 0 => (v + len).max(lower),
            Some(v) => v.min(upper),
        };
        let start = clamp(self.start, if step > 0 { lower } else { upper });
        let stop = clamp(self.stop, if step > 0 { upper } else { lower });

        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            out.push(i as usize);
            i = match i.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        out
    }
}

impl FromStr for PageRange {
    type Err = PageRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{}:{}", show(self.start), show(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        Ok(())
    }
}
