//! # Slot Layout Configuration
//!
//! The shape of the observation grid and of the per-entity reduction is fixed
//! by a handful of constants. They are never rederived from the data: an input
//! that only mentions the first thousand entities still produces one result per
//! configured entity.
//!
//! A TOML file may override any subset of the constants; missing keys keep the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Number of entities reduced and written, `id` 1..=N.
pub const DEFAULT_ENTITY_COUNT: usize = 110_000;
/// Number of date slots per entity.
pub const DEFAULT_SLOT_COUNT: usize = 62;
/// Leading slots discarded before grouping.
pub const DEFAULT_LEADING_SKIP: usize = 4;
/// Width of one group of contiguous slots.
pub const DEFAULT_ROW_WIDTH: usize = 7;
/// Number of histogram bins an indicator value can land in.
pub const DEFAULT_BIN_COUNT: usize = 17;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error while reading layout file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse layout file: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid slot layout: {0}")]
    InvalidLayout(String),
}

/// Grid and reduction constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlotLayout {
    pub entities: usize,
    pub slots: usize,
    pub skip: usize,
    pub width: usize,
    pub bins: usize,
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self {
            entities: DEFAULT_ENTITY_COUNT,
            slots: DEFAULT_SLOT_COUNT,
            skip: DEFAULT_LEADING_SKIP,
            width: DEFAULT_ROW_WIDTH,
            bins: DEFAULT_BIN_COUNT,
        }
    }
}

impl SlotLayout {
    /// Number of complete groups after the leading skip.
    pub fn rows(&self) -> usize {
        match self.width {
            0 => 0,
            width => self.slots.saturating_sub(self.skip) / width,
        }
    }

    /// Slots at the end of the vector that do not fill a complete group and are dropped.
    pub fn trailing_slots(&self) -> usize {
        match self.width {
            0 => 0,
            width => self.slots.saturating_sub(self.skip) % width,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("entities", self.entities),
            ("slots", self.slots),
            ("width", self.width),
            ("bins", self.bins),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidLayout(format!(
                    "'{name}' must be greater than zero"
                )));
            }
        }
        if self.skip >= self.slots {
            return Err(ConfigError::InvalidLayout(format!(
                "'skip' ({}) must be smaller than 'slots' ({})",
                self.skip, self.slots
            )));
        }
        if self.rows() == 0 {
            return Err(ConfigError::InvalidLayout(format!(
                "{} slots after skipping {} do not fill a single group of width {}",
                self.slots - self.skip,
                self.skip,
                self.width
            )));
        }
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let layout: SlotLayout = toml::from_str(text)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Loads and validates a layout from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_layout_has_eight_rows_and_drops_two_slots() {
        let layout = SlotLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.rows(), 8);
        assert_eq!(layout.trailing_slots(), 2);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let layout = SlotLayout::from_toml_str("entities = 10\nslots = 438\n").unwrap();
        assert_eq!(layout.entities, 10);
        assert_eq!(layout.slots, 438);
        assert_eq!(layout.skip, DEFAULT_LEADING_SKIP);
        assert_eq!(layout.width, DEFAULT_ROW_WIDTH);
        assert_eq!(layout.bins, DEFAULT_BIN_COUNT);
        assert_eq!(layout.rows(), 62);
        assert_eq!(layout.trailing_slots(), 0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SlotLayout::from_toml_str("entites = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)), "got {err:?}");
    }

    #[test]
    fn layout_without_a_complete_row_is_invalid() {
        let err = SlotLayout::from_toml_str("slots = 10\nskip = 4\nwidth = 7\n").unwrap_err();
        match err {
            ConfigError::InvalidLayout(msg) => assert!(msg.contains("width 7"), "{msg}"),
            other => panic!("Expected InvalidLayout, got {other:?}"),
        }
    }

    #[test]
    fn zero_counts_are_invalid() {
        let err = SlotLayout::from_toml_str("bins = 0\n").unwrap_err();
        match err {
            ConfigError::InvalidLayout(msg) => assert!(msg.contains("'bins'"), "{msg}"),
            other => panic!("Expected InvalidLayout, got {other:?}"),
        }
    }

    #[test]
    fn skip_must_leave_slots() {
        let err = SlotLayout::from_toml_str("slots = 4\nskip = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLayout(_)), "got {err:?}");
    }

    #[test]
    fn load_reads_a_layout_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "entities = 3\nbins = 9").unwrap();
        file.flush().unwrap();

        let layout = SlotLayout::load(file.path()).unwrap();
        assert_eq!(layout.entities, 3);
        assert_eq!(layout.bins, 9);
        assert_eq!(layout.slots, DEFAULT_SLOT_COUNT);
    }

    #[test]
    fn load_of_a_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SlotLayout::load(&dir.path().join("layout.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)), "got {err:?}");
    }

    #[test]
    fn load_validates_the_file_contents() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "width = 0").unwrap();
        file.flush().unwrap();

        let err = SlotLayout::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLayout(_)), "got {err:?}");
    }
}
