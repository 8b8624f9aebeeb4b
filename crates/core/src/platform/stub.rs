use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use anyhow::{bail, Result};
use image::{Rgba, RgbaImage};

use crate::matcher::{Locate, Template};
use crate::types::*;
use crate::logger;
use super::Platform;

/// Dry-run platform: logs every call, never touches the real pointer.
pub struct StubPlatform {
    size: Size,
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self { size: Size::new(1920, 1080) }
    }
}

impl Platform for StubPlatform {
    fn reported_size(&self) -> Result<Size> {
        logger::info_p("stub", &format!("reported_size() -> {}", self.size));
        Ok(self.size)
    }

    fn capture_screen(&self) -> Result<RgbaImage> {
        logger::info_p("stub", "capture_screen()");
        Ok(RgbaImage::from_pixel(self.size.width, self.size.height, Rgba([0, 0, 0, 255])))
    }

    fn move_to(&self, point: ClickPoint) -> Result<()> {
        logger::info_p("stub", &format!("move_to{}", point));
        Ok(())
    }

    fn click(&self) -> Result<()> {
        logger::info_p("stub", "click()");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Platform with fixed sizes that records pointer activity. Capture and
/// input failures can be switched on to exercise error paths.
pub struct ScriptedPlatform {
    pub reported: Size,
    pub captured: Size,
    pub capture_fails: Cell<bool>,
    pub input_fails: Cell<bool>,
    pub moves: RefCell<Vec<ClickPoint>>,
    pub clicks: RefCell<Vec<ClickPoint>>,
    pub captures: Cell<usize>,
}

impl ScriptedPlatform {
    pub fn new(reported: Size, captured: Size) -> Self {
        Self {
            reported,
            captured,
            capture_fails: Cell::new(false),
            input_fails: Cell::new(false),
            moves: RefCell::new(Vec::new()),
            clicks: RefCell::new(Vec::new()),
            captures: Cell::new(0),
        }
    }

    pub fn click_count(&self) -> usize {
        self.clicks.borrow().len()
    }

    pub fn last_click(&self) -> Option<ClickPoint> {
        self.clicks.borrow().last().copied()
    }
}

impl Platform for ScriptedPlatform {
    fn reported_size(&self) -> Result<Size> {
        if self.input_fails.get() {
            bail!("input controller unavailable");
        }
        Ok(self.reported)
    }

    fn capture_screen(&self) -> Result<RgbaImage> {
        if self.capture_fails.get() {
            bail!("screen capture not permitted");
        }
        self.captures.set(self.captures.get() + 1);
        Ok(RgbaImage::new(self.captured.width, self.captured.height))
    }

    fn move_to(&self, point: ClickPoint) -> Result<()> {
        if self.input_fails.get() {
            bail!("cannot move pointer");
        }
        self.moves.borrow_mut().push(point);
        Ok(())
    }

    fn click(&self) -> Result<()> {
        if self.input_fails.get() {
            bail!("cannot click");
        }
        let at = self.moves.borrow().last().copied().unwrap_or(ClickPoint::new(0, 0));
        self.clicks.borrow_mut().push(at);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Locator that answers from per-template queues instead of looking at
/// pixels. An empty queue means "not found".
#[derive(Default)]
pub struct ScriptedLocator {
    answers: RefCell<HashMap<String, VecDeque<Option<MatchResult>>>>,
    pub lookups: RefCell<Vec<String>>,
}

impl ScriptedLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next answer for the template labelled `label`.
    pub fn push(&self, label: &str, answer: Option<MatchResult>) -> &Self {
        self.answers
            .borrow_mut()
            .entry(label.to_string())
            .or_default()
            .push_back(answer);
        self
    }

    pub fn lookup_count(&self, label: &str) -> usize {
        self.lookups.borrow().iter().filter(|l| l.as_str() == label).count()
    }
}

impl Locate for ScriptedLocator {
    fn locate(&self, template: &Template, _screen: &RgbaImage, _confidence: f32) -> Option<MatchResult> {
        self.lookups.borrow_mut().push(template.label.clone());
        self.answers
            .borrow_mut()
            .get_mut(&template.label)
            .and_then(|q| q.pop_front())
            .flatten()
    }
}
