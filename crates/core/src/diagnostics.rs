//! One-shot verification routines and the screenshot markup they produce.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::click;
use crate::geometry;
use crate::logger;
use crate::matcher::Locate;
use crate::platform::Platform;
use crate::runner::AutoClicker;
use crate::settings::Settings;
use crate::sleep::Pause;
use crate::types::*;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const GREEN: Rgba<u8> = Rgba([0, 200, 0, 255]);

/// Time given to the operator to bring the target application forward.
pub const SWITCH_DELAY: f64 = 5.0;

/// Confidence levels tried, in order, by the detection debug routine.
pub const DEBUG_CONFIDENCE_LEVELS: [f32; 3] = [0.9, 0.8, 0.7];

pub fn slug(description: &str) -> String {
    description.replace(' ', "_")
}

pub fn save(image: &RgbaImage, dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    image
        .save(&path)
        .with_context(|| format!("cannot save {}", path.display()))?;
    logger::info_p("debug", &format!("saved {}", path.display()));
    Ok(path)
}

/// Save, logging instead of failing. Debug output never stops a run.
pub fn save_soft(image: &RgbaImage, dir: &Path, name: &str) {
    if let Err(e) = save(image, dir, name) {
        logger::error_p("debug", &format!("{:#}", e));
    }
}

fn crosshair(img: &mut RgbaImage, x: i32, y: i32, half: i32, thickness: i32, color: Rgba<u8>) {
    let (x, y, half) = (x as f32, y as f32, half as f32);
    for t in 0..thickness {
        let t = t as f32;
        draw_line_segment_mut(img, (x - half, y + t), (x + half, y + t), color);
        draw_line_segment_mut(img, (x + t, y - half), (x + t, y + half), color);
    }
}

fn ring(img: &mut RgbaImage, x: i32, y: i32, radius: i32, thickness: i32, color: Rgba<u8>) {
    for r in (radius - thickness + 1).max(1)..=radius {
        draw_hollow_circle_mut(img, (x, y), r, color);
    }
}

fn frame(img: &mut RgbaImage, left: i32, top: i32, w: u32, h: u32, thickness: u32, color: Rgba<u8>) {
    for t in 0..thickness {
        if w <= 2 * t || h <= 2 * t {
            break;
        }
        let rect = Rect::at(left + t as i32, top + t as i32).of_size(w - 2 * t, h - 2 * t);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Screenshot with a red crosshair and a blue ring at `(x, y)`.
pub fn mark_click(screen: &RgbaImage, x: i32, y: i32) -> RgbaImage {
    let mut img = screen.clone();
    crosshair(&mut img, x, y, 20, 2, RED);
    ring(&mut img, x, y, 10, 2, BLUE);
    img
}

/// Screenshot with a red border and a blue crosshair in the middle.
pub fn mark_boundaries(screen: &RgbaImage) -> RgbaImage {
    let mut img = screen.clone();
    let (w, h) = img.dimensions();
    frame(&mut img, 0, 0, w, h, 3, RED);
    crosshair(&mut img, (w / 2) as i32, (h / 2) as i32, 50, 2, BLUE);
    img
}

/// Log reported against captured size, save annotated screenshots, then walk
/// the pointer round the corners and the center.
pub fn check_screen(platform: &dyn Platform, pause: &mut dyn Pause, dir: &Path) -> Result<()> {
    logger::info_p("debug", "checking screen dimensions");
    let reported = platform.reported_size()?;
    logger::info_p("debug", &format!("input controller reports {}", reported));

    let screen = platform.capture_screen()?;
    let captured = Size::new(screen.width(), screen.height());
    logger::info_p("debug", &format!("screenshot dimensions: {}", captured));

    let geometry = geometry::reconcile(reported, Ok(captured));
    logger::info_p(
        "debug",
        &format!("screen scaling factors: {:.2}x, {:.2}x", geometry.scale_x, geometry.scale_y),
    );

    save(&screen, dir, "screen_dimensions_check.png")?;
    save(&mark_boundaries(&screen), dir, "screen_boundaries.png")?;

    let (w, h) = (captured.width as i32, captured.height as i32);
    let spots = [
        (10, 10, "top-left"),
        (w - 10, 10, "top-right"),
        (10, h - 10, "bottom-left"),
        (w - 10, h - 10, "bottom-right"),
        (w / 2, h / 2, "center"),
    ];
    for (x, y, position) in spots {
        let (ix, iy) = geometry.to_input(x, y);
        let point = ClickPoint::new(ix, iy);
        logger::info_p("debug", &format!("moving mouse to {} {}", position, point));
        platform.move_to(point)?;
        pause.pause(0.5);
        if pause.cancelled() {
            break;
        }
    }

    logger::info_p("debug", "screen dimension check completed");
    Ok(())
}

/// Find and click the start button once, with screenshots either side.
pub fn test_click(
    settings: &Settings,
    platform: &dyn Platform,
    locator: &dyn Locate,
    pause: &mut dyn Pause,
) -> Result<bool> {
    logger::info_p("debug", "testing single click on start button");
    let clicker = AutoClicker::new(settings, platform, locator)?;

    logger::info_p("debug", "switch to your target application...");
    pause.pause(SWITCH_DELAY);

    match platform.capture_screen() {
        Ok(img) => save_soft(&img, &settings.debug_dir, "debug_before_click.png"),
        Err(e) => logger::error_p("debug", &format!("cannot capture before click: {:#}", e)),
    }

    let outcome = clicker.find_and_click(&clicker.templates().start, pause)?;

    pause.pause(1.0);
    match platform.capture_screen() {
        Ok(img) => save_soft(&img, &settings.debug_dir, "debug_after_click.png"),
        Err(e) => logger::error_p("debug", &format!("cannot capture after click: {:#}", e)),
    }

    if outcome.clicked() {
        logger::info_p("debug", "successfully clicked start button");
    } else {
        logger::warn_p("debug", "failed to find or click start button");
    }
    logger::info_p("debug", "test click completed");
    Ok(outcome.clicked())
}

/// Locate every template at decreasing confidence and save an annotated
/// screenshot for each one found. Returns the labels that were found.
pub fn debug_images(
    settings: &Settings,
    platform: &dyn Platform,
    locator: &dyn Locate,
    levels: &[f32],
    pause: &mut dyn Pause,
) -> Result<Vec<String>> {
    logger::info_p("debug", "starting image detection debug mode");
    let clicker = AutoClicker::new(settings, platform, locator)?;
    let geometry = *clicker.geometry();

    logger::info_p("debug", "switch to your target application...");
    pause.pause(SWITCH_DELAY);

    let screen = platform.capture_screen()?;
    save(&screen, &settings.debug_dir, "debug_full_screen.png")?;

    let templates = clicker.templates();
    let all = [
        Some(&templates.start.primary),
        Some(&templates.end.primary),
        templates.end.alternate.as_ref(),
    ];

    let mut found = Vec::new();
    for template in all.into_iter().flatten() {
        logger::info_p("debug", &format!("attempting to locate {}...", template.label));
        let hit = levels
            .iter()
            .find_map(|&c| locator.locate(template, &screen, c).map(|m| (m, c)));

        let Some((m, confidence)) = hit else {
            logger::warn_p("debug", &format!("{} not found on screen", template.label));
            continue;
        };
        logger::info_p("debug", &format!("{} found at confidence {}: {:?}", template.label, confidence, m));

        let mut img = screen.clone();
        frame(&mut img, m.left, m.top, m.width, m.height, 3, RED);

        let (cx, cy) = m.center();
        let (ix, iy) = geometry.to_input(cx, cy);
        let point = click::resolve_click_point(&m, &geometry);
        let (x, y) = geometry.to_capture(point.x, point.y);
        if point == ClickPoint::new(ix, iy) {
            logger::info_p("debug", &format!("click coordinates {} are within screen bounds", point));
            draw_filled_circle_mut(&mut img, (x, y), 5, BLUE);
        } else {
            logger::warn_p("debug", &format!("center ({}, {}) too close to the edge, safe click point {}", ix, iy, point));
            draw_filled_circle_mut(&mut img, (x, y), 5, GREEN);
        }

        save(&img, &settings.debug_dir, &format!("debug_{}.png", slug(&template.label)))?;
        found.push(template.label.clone());
    }

    logger::info_p("debug", "debug mode completed");
    Ok(found)
}
