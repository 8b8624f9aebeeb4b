//! Shared fixtures for the end-to-end scenarios.

use std::path::Path;

use autorunner_core::geometry::ScreenGeometry;
use autorunner_core::matcher::{ButtonTemplate, Template, Templates};
use autorunner_core::types::MatchResult;
use image::RgbaImage;

pub const START: &str = "start button";
pub const END: &str = "end button";
pub const ALT_END: &str = "alternative end button";

pub fn template(label: &str) -> Template {
    Template::from_image(label, Path::new("fixture.png"), RgbaImage::new(8, 8))
}

/// Start and end templates held in memory, optionally with an alternate end.
pub fn templates(with_alt: bool) -> Templates {
    Templates {
        start: ButtonTemplate { primary: template(START), alternate: None },
        end: ButtonTemplate {
            primary: template(END),
            alternate: with_alt.then(|| template(ALT_END)),
        },
    }
}

pub fn rect(left: i32, top: i32, width: u32, height: u32) -> Option<MatchResult> {
    Some(MatchResult::new(left, top, width, height))
}

pub fn check(cond: bool, what: &str) -> Result<(), libtest_mimic::Failed> {
    if cond {
        Ok(())
    } else {
        Err(what.into())
    }
}

pub fn unit_geometry(w: u32, h: u32) -> ScreenGeometry {
    ScreenGeometry::identity(autorunner_core::types::Size::new(w, h))
}
