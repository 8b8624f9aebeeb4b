use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse};
use image::RgbaImage;

use crate::types::*;
use crate::logger;
use super::Platform;

/// Real desktop: `enigo` drives the pointer, `xcap` grabs the first monitor.
pub struct DesktopPlatform {
    enigo: Mutex<Enigo>,
}

impl DesktopPlatform {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&enigo::Settings::default())
            .map_err(|e| anyhow!("cannot connect to input controller: {:?}", e))?;
        logger::info_p("desktop", "input controller ready");
        Ok(Self { enigo: Mutex::new(enigo) })
    }

    fn with_enigo<T>(&self, f: impl FnOnce(&mut Enigo) -> Result<T>) -> Result<T> {
        let mut enigo = self
            .enigo
            .lock()
            .map_err(|_| anyhow!("input controller lock poisoned"))?;
        f(&mut enigo)
    }
}

/// The primary display, or the first one when none reports being primary.
fn primary_monitor(monitors: &[xcap::Monitor]) -> Option<&xcap::Monitor> {
    monitors
        .iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .or_else(|| monitors.first())
}

impl Platform for DesktopPlatform {
    fn reported_size(&self) -> Result<Size> {
        let (w, h) = self.with_enigo(|e| {
            e.main_display()
                .map_err(|err| anyhow!("cannot query display size: {:?}", err))
        })?;
        if w <= 0 || h <= 0 {
            return Err(anyhow!("input controller reported an empty display {}x{}", w, h));
        }
        Ok(Size::new(w as u32, h as u32))
    }

    fn capture_screen(&self) -> Result<RgbaImage> {
        let monitors = xcap::Monitor::all().context("cannot enumerate monitors")?;
        let monitor = primary_monitor(&monitors).context("no monitors found")?;
        let image = monitor.capture_image().context("screen capture failed")?;
        Ok(image)
    }

    fn move_to(&self, point: ClickPoint) -> Result<()> {
        self.with_enigo(|e| {
            e.move_mouse(point.x, point.y, Coordinate::Abs)
                .map_err(|err| anyhow!("cannot move pointer to {}: {:?}", point, err))
        })
    }

    fn click(&self) -> Result<()> {
        self.with_enigo(|e| {
            e.button(Button::Left, Direction::Click)
                .map_err(|err| anyhow!("cannot click: {:?}", err))
        })
    }

    fn name(&self) -> &'static str {
        "desktop"
    }
}
