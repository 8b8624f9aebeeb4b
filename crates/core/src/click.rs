use crate::geometry::ScreenGeometry;
use crate::logger;
use crate::types::*;

/// Minimum distance from any screen edge for a click. Edge pixels often
/// swallow clicks on some platforms.
pub const SAFE_MARGIN: i32 = 20;

/// Whether `(x, y)` lies inside `[margin, dim - margin]` on both axes.
pub fn within_safe_bounds(x: i32, y: i32, screen: Size) -> bool {
    let (w, h) = (screen.width as i32, screen.height as i32);
    x >= SAFE_MARGIN && y >= SAFE_MARGIN && x <= w - SAFE_MARGIN && y <= h - SAFE_MARGIN
}

fn clamp_axis(v: i32, dim: u32) -> i32 {
    v.max(SAFE_MARGIN).min(dim as i32 - SAFE_MARGIN)
}

/// Turn a match rectangle into a point that is safe to click.
///
/// The center of the match is projected into input-space and checked
/// against the input-space screen. If that lands in the edge margin, the
/// match's projected top-left corner inset by the margin is used instead,
/// clamped into the safe interior.
pub fn resolve_click_point(m: &MatchResult, geometry: &ScreenGeometry) -> ClickPoint {
    let (cx, cy) = m.center();
    let (x, y) = geometry.to_input(cx, cy);
    if geometry.is_scaled() {
        logger::info_p("click", &format!("scaled ({}, {}) to ({}, {})", cx, cy, x, y));
    }

    let screen = geometry.input();
    if within_safe_bounds(x, y, screen) {
        return ClickPoint::new(x, y);
    }

    let (left, top) = geometry.to_input(m.left, m.top);
    let safe = ClickPoint::new(
        clamp_axis(left + SAFE_MARGIN, screen.width),
        clamp_axis(top + SAFE_MARGIN, screen.height),
    );
    logger::warn_p(
        "click",
        &format!("({}, {}) is outside or too close to the edge of {}, using {}", x, y, screen, safe),
    );
    safe
}

/// Center of the input-space screen.
pub fn center_click_point(geometry: &ScreenGeometry) -> ClickPoint {
    let screen = geometry.input();
    ClickPoint::new((screen.width / 2) as i32, (screen.height / 2) as i32)
}
