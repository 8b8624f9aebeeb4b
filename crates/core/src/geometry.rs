//! Reconciles the screen size the input controller reports with the size of
//! an actual screenshot. On scaled (HiDPI) displays screenshots are larger
//! than the pointer's coordinate space, so every match location has to be
//! divided by the scale factor before it can be clicked.

use anyhow::Result;

use crate::logger;
use crate::platform::Platform;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenGeometry {
    /// Size reported by the input controller. Click points live here.
    pub logical: Size,
    /// Authoritative capture size, used to judge template sizes.
    pub actual: Size,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl ScreenGeometry {
    /// Geometry where capture-space and input-space coincide.
    pub fn identity(size: Size) -> Self {
        Self { logical: size, actual: size, scale_x: 1.0, scale_y: 1.0 }
    }

    /// Geometry from an explicit scale factor instead of a capture.
    pub fn with_scale(logical: Size, scale: f64) -> Self {
        let actual = Size::new(
            (logical.width as f64 * scale).round() as u32,
            (logical.height as f64 * scale).round() as u32,
        );
        Self { logical, actual, scale_x: scale, scale_y: scale }
    }

    /// Capture-space size, as seen on screenshots.
    pub fn screen(&self) -> Size {
        self.actual
    }

    /// Input-space size, as seen by the pointer. Click points are checked
    /// against this.
    pub fn input(&self) -> Size {
        self.logical
    }

    pub fn is_scaled(&self) -> bool {
        self.scale_x != 1.0 || self.scale_y != 1.0
    }

    /// Project a capture-space point into input-space, truncating to pixels.
    pub fn to_input(&self, x: i32, y: i32) -> (i32, i32) {
        if !self.is_scaled() {
            return (x, y);
        }
        ((x as f64 / self.scale_x) as i32, (y as f64 / self.scale_y) as i32)
    }

    /// Inverse of [`Self::to_input`], for drawing input-space points on a
    /// screenshot.
    pub fn to_capture(&self, x: i32, y: i32) -> (i32, i32) {
        ((x as f64 * self.scale_x) as i32, (y as f64 * self.scale_y) as i32)
    }
}

/// Derive scale factors from the reported size and the captured size.
///
/// A failed capture keeps the reported size with unit scale; clicks still
/// work, only less precisely on scaled displays.
pub fn reconcile(reported: Size, captured: Result<Size>) -> ScreenGeometry {
    let captured = match captured {
        Ok(size) => size,
        Err(e) => {
            logger::error_p("geometry", &format!("error verifying screen dimensions: {:#}", e));
            return ScreenGeometry::identity(reported);
        }
    };

    if captured == reported {
        return ScreenGeometry::identity(reported);
    }
    if reported.is_empty() || captured.is_empty() {
        logger::warn_p(
            "geometry",
            &format!("cannot derive scale from {} and {}, assuming unit scale", reported, captured),
        );
        let size = if captured.is_empty() { reported } else { captured };
        return ScreenGeometry::identity(size);
    }

    logger::warn_p(
        "geometry",
        &format!(
            "screen size mismatch: input controller reports {} but screenshot is {}",
            reported, captured
        ),
    );
    let geometry = ScreenGeometry {
        logical: reported,
        actual: captured,
        scale_x: captured.width as f64 / reported.width as f64,
        scale_y: captured.height as f64 / reported.height as f64,
    };
    logger::info_p(
        "geometry",
        &format!("scaling factors: {}x, {}x", geometry.scale_x, geometry.scale_y),
    );
    logger::info_p("geometry", &format!("updated screen dimensions to {}", captured));
    geometry
}

/// Query the platform and reconcile. A failing size query means the input
/// controller is unusable and is returned as an error.
pub fn probe(platform: &dyn Platform, scale_override: Option<f64>) -> Result<ScreenGeometry> {
    let reported = platform.reported_size()?;
    logger::info_p("geometry", &format!("input controller reports {}", reported));

    if let Some(scale) = scale_override {
        logger::info_p("geometry", &format!("using explicit scaling factor: {}", scale));
        return Ok(ScreenGeometry::with_scale(reported, scale));
    }

    let captured = platform
        .capture_screen()
        .map(|img| Size::new(img.width(), img.height()));
    Ok(reconcile(reported, captured))
}
