use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::imageops::FilterType;
use image::RgbaImage;

use crate::logger;
use crate::settings::Settings;
use crate::types::*;

/// How the matcher can score candidate locations. Decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchCapability {
    /// Normalized cross-correlation, thresholded by a confidence value.
    Confidence,
    /// Pixel-exact comparison only; confidence values are ignored.
    ExactOnly,
}

impl MatchCapability {
    pub fn detect() -> Self {
        if cfg!(feature = "cv") {
            MatchCapability::Confidence
        } else {
            MatchCapability::ExactOnly
        }
    }
}

/// A reference bitmap loaded from disk.
#[derive(Debug, Clone)]
pub struct Template {
    pub label: String,
    pub path: PathBuf,
    pub image: RgbaImage,
}

impl Template {
    pub fn open(label: &str, path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("cannot read {} image {}", label, path.display()))?
            .to_rgba8();
        Ok(Self::from_image(label, path, image))
    }

    pub fn from_image(label: &str, path: &Path, image: RgbaImage) -> Self {
        Self { label: label.to_string(), path: path.to_path_buf(), image }
    }

    pub fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

/// A button with an optional second appearance.
#[derive(Debug, Clone)]
pub struct ButtonTemplate {
    pub primary: Template,
    pub alternate: Option<Template>,
}

impl ButtonTemplate {
    /// Load the primary image (required) and the alternate image (optional).
    pub fn load(label: &str, primary: &Path, alternate: Option<&Path>) -> Result<Self> {
        if !primary.is_file() {
            bail!("{} image not found: {}", label, primary.display());
        }
        let primary = Template::open(label, primary)?;

        let alternate = match alternate {
            Some(path) if path.is_file() => {
                match Template::open(&format!("alternative {}", label), path) {
                    Ok(t) => Some(t),
                    Err(e) => {
                        logger::warn_p("matcher", &format!("{:#}", e));
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(Self { primary, alternate })
    }

    pub fn label(&self) -> &str {
        &self.primary.label
    }

    fn templates_mut(&mut self) -> impl Iterator<Item = &mut Template> {
        std::iter::once(&mut self.primary).chain(self.alternate.as_mut())
    }
}

/// The start and end buttons, validated and ready for matching.
#[derive(Debug, Clone)]
pub struct Templates {
    pub start: ButtonTemplate,
    pub end: ButtonTemplate,
}

impl Templates {
    pub fn load(settings: &Settings, screen: Size) -> Result<Self> {
        let start = ButtonTemplate::load("start button", &settings.start_button_path(), None)?;
        let alt = settings.end_button_alt_path();
        let end = ButtonTemplate::load("end button", &settings.end_button_path(), Some(&alt))?;

        let mut templates = Self { start, end };
        if settings.resize_images {
            templates.prescale(&settings.images_dir.join("scaled"), screen);
        }
        templates.report(screen);
        Ok(templates)
    }

    /// Shrink templates that do not fit on `screen`, saving the scaled copies
    /// to `dir`. A template that fails to scale keeps its original image.
    pub fn prescale(&mut self, dir: &Path, screen: Size) {
        logger::info_p("matcher", &format!("preparing scaled images for {}", screen));
        if let Err(e) = std::fs::create_dir_all(dir) {
            logger::error_p("matcher", &format!("cannot create {}: {}", dir.display(), e));
            return;
        }
        for button in [&mut self.start, &mut self.end] {
            for template in button.templates_mut() {
                if let Err(e) = prescale_template(template, dir, screen) {
                    logger::error_p("matcher", &format!("error scaling {}: {:#}", template.label, e));
                }
            }
        }
    }

    fn report(&self, screen: Size) {
        for button in [&self.start, &self.end] {
            let t = &button.primary;
            logger::info_p("matcher", &format!("{} image: {} ({})", t.label, t.path.display(), t.size()));
            match &button.alternate {
                Some(alt) => logger::info_p(
                    "matcher",
                    &format!("{} image: {} ({})", alt.label, alt.path.display(), alt.size()),
                ),
                None if button.label() == "end button" => {
                    logger::info_p("matcher", "no alternative end button image provided")
                }
                None => {}
            }
        }

        let too_big = [&self.start.primary, &self.end.primary]
            .iter()
            .any(|t| t.image.width() > screen.width || t.image.height() > screen.height);
        if too_big {
            logger::warn_p("matcher", "some button images are larger than the screen, consider --resize");
        }
    }
}

/// Scale factor that fits an image of `image` size onto `screen`, never above 1.
pub fn fit_scale(image: Size, screen: Size) -> f64 {
    if image.is_empty() {
        return 1.0;
    }
    let sx = (screen.width as f64 / image.width as f64).min(1.0);
    let sy = (screen.height as f64 / image.height as f64).min(1.0);
    sx.min(sy)
}

fn prescale_template(template: &mut Template, dir: &Path, screen: Size) -> Result<()> {
    let scale = fit_scale(template.size(), screen);
    if scale >= 1.0 {
        return Ok(());
    }
    let w = ((template.image.width() as f64 * scale) as u32).max(1);
    let h = ((template.image.height() as f64 * scale) as u32).max(1);
    let resized = image::imageops::resize(&template.image, w, h, FilterType::Lanczos3);

    let stem = template
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| template.label.replace(' ', "_"));
    let out = dir.join(format!("{}_scaled.png", stem));
    resized
        .save(&out)
        .with_context(|| format!("cannot save {}", out.display()))?;
    logger::info_p("matcher", &format!("saved scaled image: {} ({}x{})", out.display(), w, h));

    template.image = resized;
    template.path = out;
    Ok(())
}

/// Finds templates on a captured screen.
pub trait Locate {
    /// Best match of `template` on `screen`, or `None` when nothing clears
    /// `confidence`. Never fails: lookup problems count as "not found".
    fn locate(&self, template: &Template, screen: &RgbaImage, confidence: f32) -> Option<MatchResult>;

    /// Try the primary image, then the alternate. Returns the match together
    /// with the template that produced it.
    fn locate_with_fallback<'a>(
        &self,
        button: &'a ButtonTemplate,
        screen: &RgbaImage,
        confidence: f32,
    ) -> Option<(MatchResult, &'a Template)> {
        if let Some(m) = self.locate(&button.primary, screen, confidence) {
            return Some((m, &button.primary));
        }
        let alt = button.alternate.as_ref()?;
        logger::info_p("matcher", &format!("primary {} not found, trying alternative", button.label()));
        self.locate(alt, screen, confidence).map(|m| (m, alt))
    }
}

/// Template matcher over in-memory screenshots.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    capability: MatchCapability,
}

impl Matcher {
    pub fn new(capability: MatchCapability) -> Self {
        if capability == MatchCapability::ExactOnly {
            logger::warn_p("matcher", "confidence matching unavailable, falling back to exact matching");
        }
        Self { capability }
    }

    pub fn detect() -> Self {
        Self::new(MatchCapability::detect())
    }

    pub fn capability(&self) -> MatchCapability {
        self.capability
    }

    fn try_locate(&self, template: &RgbaImage, screen: &RgbaImage, confidence: f32) -> Result<Option<MatchResult>> {
        if template.width() == 0 || template.height() == 0 {
            bail!("template is empty");
        }
        if template.width() > screen.width() || template.height() > screen.height() {
            bail!(
                "template {}x{} is larger than the screen {}x{}",
                template.width(),
                template.height(),
                screen.width(),
                screen.height()
            );
        }
        match self.capability {
            #[cfg(feature = "cv")]
            MatchCapability::Confidence => Ok(find_correlated(template, screen, confidence)),
            _ => {
                let _ = confidence;
                Ok(find_exact(template, screen))
            }
        }
    }
}

impl Locate for Matcher {
    fn locate(&self, template: &Template, screen: &RgbaImage, confidence: f32) -> Option<MatchResult> {
        match self.try_locate(&template.image, screen, confidence) {
            Ok(Some(m)) => {
                logger::info_p(
                    "matcher",
                    &format!(
                        "found {} at left={} top={} width={} height={}",
                        template.label, m.left, m.top, m.width, m.height
                    ),
                );
                Some(m)
            }
            Ok(None) => None,
            Err(e) => {
                logger::error_p("matcher", &format!("error finding {}: {:#}", template.label, e));
                None
            }
        }
    }
}

#[cfg(feature = "cv")]
fn find_correlated(template: &RgbaImage, screen: &RgbaImage, confidence: f32) -> Option<MatchResult> {
    use image::imageops::grayscale;

    let (score, left, top) = crate::correlate::best_match(&grayscale(screen), &grayscale(template))?;
    if !score.is_finite() || score < confidence {
        return None;
    }
    Some(MatchResult::new(left as i32, top as i32, template.width(), template.height()))
}

/// First position where every RGB value of `template` equals the screen.
fn find_exact(template: &RgbaImage, screen: &RgbaImage) -> Option<MatchResult> {
    let (tw, th) = template.dimensions();
    let (sw, sh) = screen.dimensions();
    let first = template.get_pixel(0, 0);

    for sy in 0..=(sh - th) {
        for sx in 0..=(sw - tw) {
            if screen.get_pixel(sx, sy).0[..3] != first.0[..3] {
                continue;
            }
            let hit = (0..th).all(|ty| {
                (0..tw).all(|tx| {
                    screen.get_pixel(sx + tx, sy + ty).0[..3] == template.get_pixel(tx, ty).0[..3]
                })
            });
            if hit {
                return Some(MatchResult::new(sx as i32, sy as i32, tw, th));
            }
        }
    }
    None
}
