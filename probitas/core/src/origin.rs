//! Source locations attributed to builder calls.
//!
//! Capture relies on `#[track_caller]`: every public builder method carries
//! the attribute, so [`Origin::capture`] observes the user's call site rather
//! than the builder internals. Capture can be switched off process-wide with
//! `PROBITAS_CAPTURE_ORIGIN=false` or [`set_capture_enabled`]; when off,
//! records simply carry no origin.

use std::{
    env, fmt,
    panic::Location,
    sync::{
        LazyLock,
        atomic::{AtomicBool, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::scenario::{builder, state};

const CAPTURE_ENV: &str = "PROBITAS_CAPTURE_ORIGIN";

static CAPTURE_ENABLED: LazyLock<AtomicBool> = LazyLock::new(|| {
    let enabled = env::var(CAPTURE_ENV).map_or(true, |value| {
        !matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "false" | "0" | "off"
        )
    });
    AtomicBool::new(enabled)
});

/// Files whose frames never count as user code.
fn internal_files() -> [&'static str; 3] {
    [file!(), builder::SOURCE_FILE, state::SOURCE_FILE]
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<u32>,
}

impl Origin {
    #[must_use]
    pub fn new(path: impl Into<String>, line: Option<u32>, column: Option<u32>) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }

    /// Returns the location of the nearest `#[track_caller]`-propagated call
    /// site, or `None` when capture is disabled or the location falls inside
    /// the builder itself.
    #[must_use]
    #[track_caller]
    pub fn capture() -> Option<Self> {
        if !capture_enabled() {
            return None;
        }
        Self::from_location(Location::caller())
    }

    fn from_location(location: &Location<'_>) -> Option<Self> {
        let file = location.file();
        if file.is_empty() || internal_files().iter().any(|internal| *internal == file) {
            return None;
        }
        Some(Self::new(
            file,
            Some(location.line()),
            Some(location.column()),
        ))
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub const fn line(&self) -> Option<u32> {
        self.line
    }

    #[must_use]
    pub const fn column(&self) -> Option<u32> {
        self.column
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// Renders an optional origin for diagnostics.
#[must_use]
pub fn display_origin(origin: Option<&Origin>) -> String {
    origin.map_or_else(|| String::from("unknown location"), ToString::to_string)
}

#[must_use]
pub fn capture_enabled() -> bool {
    CAPTURE_ENABLED.load(Ordering::Relaxed)
}

pub fn set_capture_enabled(enabled: bool) {
    CAPTURE_ENABLED.store(enabled, Ordering::Relaxed);
}
