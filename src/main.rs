use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use autorunner_core::cli::{self, Mode};
use autorunner_core::diagnostics::{self, DEBUG_CONFIDENCE_LEVELS};
use autorunner_core::logger;
use autorunner_core::matcher::{MatchCapability, Matcher};
use autorunner_core::platform::{create_platform, Platform};
use autorunner_core::runner::{AutoClicker, RoundMachine, StopReason};
use autorunner_core::settings::{Settings, SETTINGS_FILE};
use autorunner_core::sleep::{Pause, ThreadPause};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    // Init logger
    logger::init(&cwd);
    logger::info("starting auto clicker");

    match run(&args, &cwd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::error(&format!("application error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String], cwd: &std::path::Path) -> Result<()> {
    let mode = Mode::parse(args)?;
    let settings = Settings::load(&cwd.join(SETTINGS_FILE)).with_mode(&mode);
    settings.validate()?;
    std::fs::create_dir_all(&settings.images_dir).ok();
    log_mode(&mode);

    // Ctrl+C stops the loop at the next safe point
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || cancel.store(true, Ordering::Release))?;
    }
    let mut pause = ThreadPause::new(cancel);

    let platform = create_platform(cli::wants_stub(args))?;
    let matcher = Matcher::detect();

    if !mode.is_one_shot() {
        return run_rounds(&settings, platform.as_ref(), &matcher, &mut pause);
    }
    match mode {
        Mode::CheckScreen => diagnostics::check_screen(platform.as_ref(), &mut pause, &settings.debug_dir),
        Mode::TestClick => {
            diagnostics::test_click(&settings, platform.as_ref(), &matcher, &mut pause)?;
            Ok(())
        }
        _ => {
            let levels: &[f32] = match matcher.capability() {
                MatchCapability::Confidence => &DEBUG_CONFIDENCE_LEVELS,
                MatchCapability::ExactOnly => &[1.0],
            };
            diagnostics::debug_images(&settings, platform.as_ref(), &matcher, levels, &mut pause)?;
            Ok(())
        }
    }
}

fn log_mode(mode: &Mode) {
    match mode {
        Mode::Safe => logger::info("running in safe mode with lower confidence threshold"),
        Mode::Resize => logger::info("running in resize mode, reference images will be scaled to the screen"),
        Mode::Region => logger::info("running in region mode (search region is recorded only)"),
        Mode::Scale(f) => logger::info(&format!("using explicit scaling factor: {}", f)),
        Mode::Rounds(n) => logger::info(&format!("will stop after {} rounds", n)),
        _ => {}
    }
}

fn run_rounds(
    settings: &Settings,
    platform: &dyn Platform,
    matcher: &Matcher,
    pause: &mut ThreadPause,
) -> Result<()> {
    logger::info(&format!(
        "starting in {} seconds, switch to your target application...",
        settings.startup_delay
    ));
    pause.pause(settings.startup_delay);
    if pause.cancelled() {
        logger::info("interrupted before start, 0 rounds completed");
        return Ok(());
    }

    let clicker = AutoClicker::new(settings, platform, matcher)?;
    let mut machine = RoundMachine::new(&clicker);

    match machine.run(pause) {
        Ok(outcome) => {
            match outcome.reason {
                StopReason::Cancelled => logger::info(&format!(
                    "process interrupted by user after {} rounds",
                    outcome.rounds_completed
                )),
                StopReason::RoundLimit => logger::info(&format!(
                    "all {} rounds completed successfully",
                    outcome.rounds_completed
                )),
            }
            Ok(())
        }
        Err(aborted) => {
            logger::error(&format!("rounds completed before failure: {}", aborted.rounds_completed));
            Err(aborted.into())
        }
    }
}
