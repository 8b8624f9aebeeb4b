use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Mode;
use crate::logger;

pub const SETTINGS_FILE: &str = "autorunner.json";
pub const SAFE_CONFIDENCE: f32 = 0.7;

/// Runtime configuration. Built once at startup and shared by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub images_dir: PathBuf,
    pub start_button_img: String,
    pub end_button_img: String,
    pub end_button_alt_img: String,

    // Timings in seconds
    pub startup_delay: f64,
    pub round_wait_time: f64,
    pub between_rounds_wait_time: f64,
    pub retry_delay: f64,

    pub confidence_threshold: f32,
    pub max_failures_before_center_click: u32,

    /// Stop after this many completed rounds. `None` runs until interrupted.
    pub num_rounds: Option<u32>,

    pub debug_mode: bool,
    pub resize_images: bool,
    pub use_region: bool,
    pub scale_override: Option<f64>,

    /// Where diagnostic screenshots are written.
    pub debug_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            start_button_img: "start_button.png".into(),
            end_button_img: "end_button.png".into(),
            end_button_alt_img: "end_button_alt.png".into(),
            startup_delay: 5.0,
            round_wait_time: 30.0,
            between_rounds_wait_time: 3.0,
            retry_delay: 2.0,
            confidence_threshold: 0.8,
            max_failures_before_center_click: 5,
            num_rounds: None,
            debug_mode: false,
            resize_images: false,
            use_region: false,
            scale_override: None,
            debug_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Read settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(s) => {
                logger::info(&format!("loaded settings from {}", path.display()));
                s
            }
            Err(e) => {
                logger::warn(&format!("ignoring {}: {}", path.display(), e));
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Return a copy with the command-line mode applied.
    pub fn with_mode(&self, mode: &Mode) -> Self {
        let mut s = self.clone();
        match *mode {
            Mode::Run | Mode::CheckScreen => {}
            Mode::Debug | Mode::TestClick => s.debug_mode = true,
            Mode::Safe => s.confidence_threshold = SAFE_CONFIDENCE,
            Mode::Resize => s.resize_images = true,
            Mode::Region => s.use_region = true,
            Mode::Scale(f) => s.scale_override = Some(f),
            Mode::Rounds(n) => s.num_rounds = Some(n),
        }
        s
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            bail!(
                "confidence_threshold must be within 0..1, got {}",
                self.confidence_threshold
            );
        }
        for (name, v) in [
            ("startup_delay", self.startup_delay),
            ("round_wait_time", self.round_wait_time),
            ("between_rounds_wait_time", self.between_rounds_wait_time),
            ("retry_delay", self.retry_delay),
        ] {
            if !v.is_finite() || v < 0.0 {
                bail!("{} must be a non-negative number of seconds, got {}", name, v);
            }
        }
        if self.max_failures_before_center_click == 0 {
            bail!("max_failures_before_center_click must be at least 1");
        }
        if let Some(scale) = self.scale_override {
            if !scale.is_finite() || scale <= 0.0 {
                bail!("scale factor must be positive, got {}", scale);
            }
        }
        Ok(())
    }

    pub fn start_button_path(&self) -> PathBuf {
        self.images_dir.join(&self.start_button_img)
    }

    pub fn end_button_path(&self) -> PathBuf {
        self.images_dir.join(&self.end_button_img)
    }

    pub fn end_button_alt_path(&self) -> PathBuf {
        self.images_dir.join(&self.end_button_alt_img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.round_wait_time, 30.0);
        assert_eq!(s.between_rounds_wait_time, 3.0);
        assert_eq!(s.retry_delay, 2.0);
        assert_eq!(s.max_failures_before_center_click, 5);
        assert_eq!(s.num_rounds, None);
        assert_eq!(s.start_button_path(), PathBuf::from("images/start_button.png"));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn modes_do_not_touch_the_original() {
        let base = Settings::default();
        let safe = base.with_mode(&Mode::Safe);
        assert_eq!(safe.confidence_threshold, SAFE_CONFIDENCE);
        assert_eq!(base.confidence_threshold, 0.8);

        assert!(base.with_mode(&Mode::Debug).debug_mode);
        assert!(base.with_mode(&Mode::TestClick).debug_mode);
        assert!(base.with_mode(&Mode::Resize).resize_images);
        assert!(base.with_mode(&Mode::Region).use_region);
        assert_eq!(base.with_mode(&Mode::Scale(2.0)).scale_override, Some(2.0));
        assert_eq!(base.with_mode(&Mode::Rounds(4)).num_rounds, Some(4));
        assert_eq!(base.with_mode(&Mode::Run), base);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut s = Settings::default();
        s.confidence_threshold = 1.2;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.retry_delay = -1.0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.max_failures_before_center_click = 0;
        assert!(s.validate().is_err());

        let s = Settings::default().with_mode(&Mode::Scale(0.0));
        assert!(s.validate().is_err());
    }

    #[test]
    fn load_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "retry_delay": 0.5, "images_dir": "assets" }"#).unwrap();

        let s = Settings::load(&path);
        assert_eq!(s.retry_delay, 0.5);
        assert_eq!(s.images_dir, PathBuf::from("assets"));
        assert_eq!(s.round_wait_time, 30.0);
    }

    #[test]
    fn load_missing_or_broken_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(&dir.path().join("nope.json")), Settings::default());

        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let s = Settings::default().with_mode(&Mode::Rounds(7));
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path), s);
    }
}
