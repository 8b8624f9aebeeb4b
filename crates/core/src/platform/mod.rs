pub mod stub;

#[cfg(feature = "desktop")]
pub mod desktop;

use anyhow::Result;
use image::RgbaImage;

use crate::types::*;

/// Screen capture and pointer control for the machine we are automating.
///
/// Capture happens in capture-space (screenshot pixels), pointer moves in
/// input-space. The two differ on scaled displays.
pub trait Platform {
    /// Screen size as the input controller sees it.
    fn reported_size(&self) -> Result<Size>;
    /// Full screenshot of the primary display.
    fn capture_screen(&self) -> Result<RgbaImage>;
    fn move_to(&self, point: ClickPoint) -> Result<()>;
    fn click(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Create the platform appropriate for the current build.
pub fn create_platform(force_stub: bool) -> Result<Box<dyn Platform>> {
    if force_stub {
        return Ok(Box::new(stub::StubPlatform::default()));
    }
    #[cfg(feature = "desktop")]
    {
        Ok(Box::new(desktop::DesktopPlatform::new()?))
    }
    #[cfg(not(feature = "desktop"))]
    {
        crate::logger::warn("built without desktop support, using stub platform");
        Ok(Box::new(stub::StubPlatform::default()))
    }
}
