use std::fmt;

use anyhow::Result;

use crate::click;
use crate::diagnostics;
use crate::geometry::{self, ScreenGeometry};
use crate::logger;
use crate::matcher::{ButtonTemplate, Locate, Templates};
use crate::platform::Platform;
use crate::settings::Settings;
use crate::sleep::Pause;
use crate::types::*;

// Pointer choreography around a click, in seconds.
const BEFORE_MOVE: f64 = 0.2;
const BEFORE_CLICK: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Clicked(ClickPoint),
    NotFound,
}

impl ClickOutcome {
    pub fn clicked(&self) -> bool {
        matches!(self, ClickOutcome::Clicked(_))
    }
}

/// Finds buttons on screen and clicks them.
pub struct AutoClicker<'a> {
    settings: &'a Settings,
    platform: &'a dyn Platform,
    locator: &'a dyn Locate,
    geometry: ScreenGeometry,
    templates: Templates,
}

impl<'a> AutoClicker<'a> {
    /// Probe the screen and load the button templates. A missing template or
    /// an unusable input controller is an error.
    pub fn new(settings: &'a Settings, platform: &'a dyn Platform, locator: &'a dyn Locate) -> Result<Self> {
        let geometry = geometry::probe(platform, settings.scale_override)?;
        let templates = Templates::load(settings, geometry.screen())?;
        logger::info_p("runner", &format!("auto clicker initialized on {} platform", platform.name()));
        Ok(Self::with_parts(settings, platform, locator, geometry, templates))
    }

    pub fn with_parts(
        settings: &'a Settings,
        platform: &'a dyn Platform,
        locator: &'a dyn Locate,
        geometry: ScreenGeometry,
        templates: Templates,
    ) -> Self {
        Self { settings, platform, locator, geometry, templates }
    }

    pub fn geometry(&self) -> &ScreenGeometry {
        &self.geometry
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    /// Look for `button` (primary, then alternate) and click it.
    ///
    /// Capture and match problems yield `NotFound`; only a pointer failure is
    /// returned as an error.
    pub fn find_and_click(&self, button: &ButtonTemplate, pause: &mut dyn Pause) -> Result<ClickOutcome> {
        let label = button.label();
        logger::info_p("runner", &format!("looking for {}...", label));

        let screen = match self.platform.capture_screen() {
            Ok(s) => s,
            Err(e) => {
                logger::error_p("runner", &format!("error finding {}: {:#}", label, e));
                return Ok(ClickOutcome::NotFound);
            }
        };
        if self.settings.debug_mode {
            diagnostics::save_soft(&screen, &self.settings.debug_dir, &format!("debug_{}.png", diagnostics::slug(label)));
        }

        let confidence = self.settings.confidence_threshold;
        let Some((m, which)) = self.locator.locate_with_fallback(button, &screen, confidence) else {
            logger::warn_p("runner", &format!("{} not found on screen", label));
            return Ok(ClickOutcome::NotFound);
        };
        logger::info_p(
            "runner",
            &format!("found {} at left={} top={} width={} height={}", which.label, m.left, m.top, m.width, m.height),
        );

        let point = click::resolve_click_point(&m, &self.geometry);
        self.click_at(point, label, pause)?;
        Ok(ClickOutcome::Clicked(point))
    }

    /// Fallback click in the middle of the screen.
    pub fn click_center(&self, pause: &mut dyn Pause) -> Result<ClickPoint> {
        let point = click::center_click_point(&self.geometry);
        logger::info_p("runner", &format!("clicking center of screen at {}", point));
        self.click_at(point, "screen center", pause)?;
        Ok(point)
    }

    fn click_at(&self, point: ClickPoint, label: &str, pause: &mut dyn Pause) -> Result<()> {
        pause.pause(BEFORE_MOVE);
        self.platform.move_to(point)?;
        pause.pause(BEFORE_CLICK);

        if self.settings.debug_mode {
            match self.platform.capture_screen() {
                Ok(screen) => {
                    let (x, y) = self.geometry.to_capture(point.x, point.y);
                    let marked = diagnostics::mark_click(&screen, x, y);
                    let name = format!("debug_click_{}.png", diagnostics::slug(label));
                    diagnostics::save_soft(&marked, &self.settings.debug_dir, &name);
                }
                Err(e) => logger::error_p("runner", &format!("error creating click debug image: {:#}", e)),
            }
        }

        self.platform.click()?;
        logger::info_p("runner", &format!("clicked {} at {}", label, point));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The operator interrupted the run.
    Cancelled,
    /// The configured number of rounds was reached.
    RoundLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub rounds_completed: u32,
    pub reason: StopReason,
}

/// The loop ended on an unrecoverable input-controller failure.
#[derive(Debug)]
pub struct RunAborted {
    pub rounds_completed: u32,
    pub source: anyhow::Error,
}

impl fmt::Display for RunAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aborted after {} rounds", self.rounds_completed)
    }
}

impl std::error::Error for RunAborted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Polls for the start and end buttons in turn.
pub struct RoundMachine<'c, 'a> {
    clicker: &'c AutoClicker<'a>,
    state: RoundState,
    counters: RunCounters,
}

impl<'c, 'a> RoundMachine<'c, 'a> {
    pub fn new(clicker: &'c AutoClicker<'a>) -> Self {
        Self {
            clicker,
            state: RoundState::SeekingStart,
            counters: RunCounters::default(),
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    fn transition(&mut self, next: RoundState) {
        if self.state != next {
            logger::info_p("runner", &format!("state: {} -> {}", self.state.label(), next.label()));
        }
        self.state = next;
    }

    /// Work out where we are before looping. Returns the initial wait.
    ///
    /// An end button on screen means a round was already running; clicking it
    /// does not count as a completed round.
    pub fn probe(&mut self, pause: &mut dyn Pause) -> Result<f64> {
        let clicker = self.clicker;
        let settings = clicker.settings();
        let templates = clicker.templates();
        logger::info_p("runner", "checking initial state...");

        if clicker.find_and_click(&templates.end, pause)?.clicked() {
            logger::info_p("runner", "found end button at startup, completing existing round");
            self.transition(RoundState::SeekingStart);
            return Ok(settings.between_rounds_wait_time);
        }
        if clicker.find_and_click(&templates.start, pause)?.clicked() {
            logger::info_p("runner", "found start button at startup, starting new round");
            self.transition(RoundState::SeekingEnd);
            return Ok(settings.round_wait_time);
        }
        logger::info_p("runner", "no buttons found at startup, will look for start button first");
        self.transition(RoundState::SeekingStart);
        Ok(0.0)
    }

    /// One poll of the current state. Returns how long to wait afterwards.
    pub fn step(&mut self, pause: &mut dyn Pause) -> Result<f64> {
        let clicker = self.clicker;
        let settings = clicker.settings();
        let templates = clicker.templates();

        match self.state {
            RoundState::SeekingEnd => {
                if clicker.find_and_click(&templates.end, pause)?.clicked() {
                    self.counters.rounds_completed += 1;
                    logger::info_p("runner", &format!("completed round {}", self.counters.rounds_completed));
                    self.transition(RoundState::SeekingStart);
                    Ok(settings.between_rounds_wait_time)
                } else {
                    logger::warn_p("runner", "failed to find end button, retrying...");
                    Ok(settings.retry_delay)
                }
            }
            RoundState::SeekingStart => {
                if clicker.find_and_click(&templates.start, pause)?.clicked() {
                    logger::info_p("runner", &format!("started round {}", self.counters.rounds_completed + 1));
                    self.counters.consecutive_start_failures = 0;
                    self.transition(RoundState::SeekingEnd);
                    return Ok(settings.round_wait_time);
                }

                self.counters.consecutive_start_failures += 1;
                let failures = self.counters.consecutive_start_failures;
                if failures >= settings.max_failures_before_center_click {
                    logger::warn_p(
                        "runner",
                        &format!("failed to find start button {} times, clicking center of screen", failures),
                    );
                    clicker.click_center(pause)?;
                    self.counters.consecutive_start_failures = 0;
                    Ok(settings.retry_delay * 2.0)
                } else {
                    logger::warn_p(
                        "runner",
                        &format!("failed to find start button (attempt {}), retrying...", failures),
                    );
                    Ok(settings.retry_delay)
                }
            }
        }
    }

    fn limit_reached(&self) -> bool {
        self.clicker
            .settings()
            .num_rounds
            .is_some_and(|n| self.counters.rounds_completed >= n)
    }

    fn drive(&mut self, pause: &mut dyn Pause) -> Result<StopReason> {
        if pause.cancelled() {
            return Ok(StopReason::Cancelled);
        }
        if self.limit_reached() {
            return Ok(StopReason::RoundLimit);
        }
        let wait = self.probe(pause)?;
        pause.pause(wait);

        loop {
            if pause.cancelled() {
                return Ok(StopReason::Cancelled);
            }
            let wait = self.step(pause)?;
            if self.limit_reached() {
                return Ok(StopReason::RoundLimit);
            }
            pause.pause(wait);
        }
    }

    /// Run until cancelled, until the round limit is hit, or until the input
    /// controller fails.
    pub fn run(&mut self, pause: &mut dyn Pause) -> std::result::Result<RunOutcome, RunAborted> {
        match self.clicker.settings().num_rounds {
            Some(n) => logger::info_p("runner", &format!("running {} rounds (press Ctrl+C to stop)", n)),
            None => logger::info_p("runner", "running rounds until interrupted (press Ctrl+C to stop)"),
        }

        let result = self.drive(pause);
        let rounds_completed = self.counters.rounds_completed;
        match result {
            Ok(reason) => Ok(RunOutcome { rounds_completed, reason }),
            Err(source) => Err(RunAborted { rounds_completed, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::matcher::Template;
    use crate::platform::stub::{ScriptedLocator, ScriptedPlatform};
    use crate::sleep::RecordingPause;
    use image::RgbaImage;

    const START: &str = "start button";
    const END: &str = "end button";
    const ALT_END: &str = "alternative end button";

    fn template(label: &str) -> Template {
        Template::from_image(label, Path::new("mem.png"), RgbaImage::new(4, 4))
    }

    fn templates(with_alt: bool) -> Templates {
        Templates {
            start: ButtonTemplate { primary: template(START), alternate: None },
            end: ButtonTemplate {
                primary: template(END),
                alternate: with_alt.then(|| template(ALT_END)),
            },
        }
    }

    fn hit() -> Option<MatchResult> {
        Some(MatchResult::new(100, 100, 50, 50))
    }

    struct Fixture {
        settings: Settings,
        platform: ScriptedPlatform,
        locator: ScriptedLocator,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                settings: Settings::default(),
                platform: ScriptedPlatform::new(Size::new(1920, 1080), Size::new(1920, 1080)),
                locator: ScriptedLocator::new(),
            }
        }

        fn clicker(&self, with_alt: bool) -> AutoClicker<'_> {
            AutoClicker::with_parts(
                &self.settings,
                &self.platform,
                &self.locator,
                ScreenGeometry::identity(Size::new(1920, 1080)),
                templates(with_alt),
            )
        }
    }

    #[test]
    fn probe_end_button_means_round_in_progress() {
        let f = Fixture::new();
        f.locator.push(END, hit());
        let clicker = f.clicker(false);
        let mut machine = RoundMachine::new(&clicker);

        let wait = machine.probe(&mut RecordingPause::new()).unwrap();
        assert_eq!(wait, f.settings.between_rounds_wait_time);
        assert_eq!(machine.state(), RoundState::SeekingStart);
        assert_eq!(machine.counters().rounds_completed, 0);
        assert_eq!(f.platform.last_click(), Some(ClickPoint::new(125, 125)));
        assert_eq!(f.locator.lookup_count(START), 0);
    }

    #[test]
    fn probe_start_button_begins_round() {
        let f = Fixture::new();
        f.locator.push(START, hit());
        let clicker = f.clicker(true);
        let mut machine = RoundMachine::new(&clicker);

        let wait = machine.probe(&mut RecordingPause::new()).unwrap();
        assert_eq!(wait, f.settings.round_wait_time);
        assert_eq!(machine.state(), RoundState::SeekingEnd);
        assert_eq!(f.locator.lookup_count(ALT_END), 1);
    }

    #[test]
    fn probe_nothing_found_waits_nothing() {
        let f = Fixture::new();
        let clicker = f.clicker(false);
        let mut machine = RoundMachine::new(&clicker);

        assert_eq!(machine.probe(&mut RecordingPause::new()).unwrap(), 0.0);
        assert_eq!(machine.state(), RoundState::SeekingStart);
        assert_eq!(f.platform.click_count(), 0);
    }

    #[test]
    fn end_click_completes_round_and_seeks_start() {
        let f = Fixture::new();
        f.locator.push(END, None).push(END, hit());
        let clicker = f.clicker(false);
        let mut machine = RoundMachine::new(&clicker);
        machine.state = RoundState::SeekingEnd;
        let mut pause = RecordingPause::new();

        assert_eq!(machine.step(&mut pause).unwrap(), f.settings.retry_delay);
        assert_eq!(machine.state(), RoundState::SeekingEnd);
        assert_eq!(machine.counters().rounds_completed, 0);

        assert_eq!(machine.step(&mut pause).unwrap(), f.settings.between_rounds_wait_time);
        assert_eq!(machine.state(), RoundState::SeekingStart);
        assert_eq!(machine.counters().rounds_completed, 1);
    }

    #[test]
    fn alternate_end_button_counts() {
        let f = Fixture::new();
        f.locator.push(END, None).push(ALT_END, hit());
        let clicker = f.clicker(true);
        let mut machine = RoundMachine::new(&clicker);
        machine.state = RoundState::SeekingEnd;

        machine.step(&mut RecordingPause::new()).unwrap();
        assert_eq!(machine.counters().rounds_completed, 1);
        assert_eq!(machine.state(), RoundState::SeekingStart);
    }

    #[test]
    fn start_click_resets_failures() {
        let f = Fixture::new();
        f.locator.push(START, None).push(START, None).push(START, hit());
        let clicker = f.clicker(false);
        let mut machine = RoundMachine::new(&clicker);
        let mut pause = RecordingPause::new();

        machine.step(&mut pause).unwrap();
        machine.step(&mut pause).unwrap();
        assert_eq!(machine.counters().consecutive_start_failures, 2);

        assert_eq!(machine.step(&mut pause).unwrap(), f.settings.round_wait_time);
        assert_eq!(machine.counters().consecutive_start_failures, 0);
        assert_eq!(machine.state(), RoundState::SeekingEnd);
    }

    #[test]
    fn repeated_start_misses_click_center() {
        let f = Fixture::new();
        let clicker = f.clicker(false);
        let mut machine = RoundMachine::new(&clicker);
        let mut pause = RecordingPause::new();

        for attempt in 1..5 {
            assert_eq!(machine.step(&mut pause).unwrap(), f.settings.retry_delay);
            assert_eq!(machine.counters().consecutive_start_failures, attempt);
        }
        assert_eq!(f.platform.click_count(), 0);

        assert_eq!(machine.step(&mut pause).unwrap(), f.settings.retry_delay * 2.0);
        assert_eq!(machine.counters().consecutive_start_failures, 0);
        assert_eq!(f.platform.last_click(), Some(ClickPoint::new(960, 540)));
        assert_eq!(machine.state(), RoundState::SeekingStart);
    }

    #[test]
    fn center_click_uses_scaled_geometry() {
        let mut f = Fixture::new();
        f.settings.max_failures_before_center_click = 1;
        let geometry = geometry::reconcile(Size::new(1920, 1080), Ok(Size::new(3840, 2160)));
        let clicker = AutoClicker::with_parts(&f.settings, &f.platform, &f.locator, geometry, templates(false));
        let mut machine = RoundMachine::new(&clicker);

        machine.step(&mut RecordingPause::new()).unwrap();
        assert_eq!(f.platform.last_click(), Some(ClickPoint::new(960, 540)));
    }

    #[test]
    fn capture_failure_is_a_miss() {
        let f = Fixture::new();
        f.platform.capture_fails.set(true);
        let clicker = f.clicker(false);
        let outcome = clicker.find_and_click(&clicker.templates().start, &mut RecordingPause::new()).unwrap();
        assert_eq!(outcome, ClickOutcome::NotFound);
    }

    #[test]
    fn input_failure_aborts_run_with_count() {
        let mut f = Fixture::new();
        f.settings.num_rounds = None;
        f.locator.push(END, hit()).push(START, hit()).push(END, hit()).push(START, hit());
        let clicker = f.clicker(false);
        let mut machine = RoundMachine::new(&clicker);
        let mut pause = RecordingPause::new();

        // probe: end clicked. step: start clicked. step: end clicked (round 1).
        machine.probe(&mut pause).unwrap();
        machine.step(&mut pause).unwrap();
        machine.step(&mut pause).unwrap();
        f.platform.input_fails.set(true);

        let err = machine.run(&mut pause).unwrap_err();
        assert_eq!(err.rounds_completed, 1);
        assert_eq!(err.to_string(), "aborted after 1 rounds");
        let report = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(report, "aborted after 1 rounds: cannot move pointer");
    }

    #[test]
    fn run_stops_on_cancel() {
        let f = Fixture::new();
        let clicker = f.clicker(false);
        let mut machine = RoundMachine::new(&clicker);
        let mut pause = RecordingPause::cancel_after(0);

        let outcome = machine.run(&mut pause).unwrap();
        assert_eq!(outcome, RunOutcome { rounds_completed: 0, reason: StopReason::Cancelled });
        assert_eq!(f.platform.click_count(), 0);
    }

    #[test]
    fn run_honours_round_limit() {
        let mut f = Fixture::new();
        f.settings.num_rounds = Some(2);
        f.locator.push(END, None).push(END, hit()).push(END, hit());
        f.locator.push(START, hit()).push(START, hit());
        let clicker = f.clicker(false);
        let mut machine = RoundMachine::new(&clicker);
        let mut pause = RecordingPause::new();

        let outcome = machine.run(&mut pause).unwrap();
        assert_eq!(outcome, RunOutcome { rounds_completed: 2, reason: StopReason::RoundLimit });
        // probe start + (end, start, end)
        assert_eq!(f.platform.click_count(), 4);
    }
}
