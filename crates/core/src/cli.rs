use anyhow::{Context, Result};

use crate::logger;

/// What the process was asked to do. Only the first argument is inspected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    Run,
    Debug,
    Safe,
    Resize,
    Region,
    TestClick,
    CheckScreen,
    Scale(f64),
    Rounds(u32),
}

/// Flag that selects the logging stub platform. Accepted in any position.
pub const STUB_FLAG: &str = "--stub";

impl Mode {
    /// Parse the argument list (without the program name).
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let first = args
            .into_iter()
            .find(|a| a.as_ref() != STUB_FLAG);
        match first {
            Some(arg) => Self::from_arg(arg.as_ref()),
            None => Ok(Mode::Run),
        }
    }

    pub fn from_arg(arg: &str) -> Result<Self> {
        let mode = match arg {
            "--debug" => Mode::Debug,
            "--safe" => Mode::Safe,
            "--resize" => Mode::Resize,
            "--region" => Mode::Region,
            "--test-click" => Mode::TestClick,
            "--check-screen" => Mode::CheckScreen,
            _ => {
                if let Some(v) = arg.strip_prefix("--scale=") {
                    let scale: f64 = v
                        .parse()
                        .with_context(|| format!("invalid scaling factor '{}'", v))?;
                    Mode::Scale(scale)
                } else if let Some(v) = arg.strip_prefix("--rounds=") {
                    let rounds: u32 = v
                        .parse()
                        .with_context(|| format!("invalid rounds value '{}'", v))?;
                    Mode::Rounds(rounds)
                } else {
                    logger::warn(&format!("unknown option '{}', running normally", arg));
                    Mode::Run
                }
            }
        };
        Ok(mode)
    }

    /// One-shot modes exit after a single routine instead of looping.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Mode::Debug | Mode::TestClick | Mode::CheckScreen)
    }
}

/// Whether the stub platform was requested anywhere on the command line.
pub fn wants_stub<S: AsRef<str>>(args: &[S]) -> bool {
    args.iter().any(|a| a.as_ref() == STUB_FLAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_runs_loop() {
        assert_eq!(Mode::parse(Vec::<String>::new()).unwrap(), Mode::Run);
    }

    #[test]
    fn simple_flags() {
        assert_eq!(Mode::from_arg("--debug").unwrap(), Mode::Debug);
        assert_eq!(Mode::from_arg("--safe").unwrap(), Mode::Safe);
        assert_eq!(Mode::from_arg("--resize").unwrap(), Mode::Resize);
        assert_eq!(Mode::from_arg("--region").unwrap(), Mode::Region);
        assert_eq!(Mode::from_arg("--test-click").unwrap(), Mode::TestClick);
        assert_eq!(Mode::from_arg("--check-screen").unwrap(), Mode::CheckScreen);
    }

    #[test]
    fn valued_flags() {
        assert_eq!(Mode::from_arg("--scale=1.5").unwrap(), Mode::Scale(1.5));
        assert_eq!(Mode::from_arg("--rounds=12").unwrap(), Mode::Rounds(12));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(Mode::from_arg("--scale=").is_err());
        assert!(Mode::from_arg("--scale=abc").is_err());
        assert!(Mode::from_arg("--rounds=-3").is_err());
        assert!(Mode::from_arg("--rounds=2.5").is_err());
    }

    #[test]
    fn only_first_argument_counts() {
        assert_eq!(Mode::parse(["--safe", "--debug"]).unwrap(), Mode::Safe);
        assert_eq!(Mode::parse(["--bogus", "--debug"]).unwrap(), Mode::Run);
    }

    #[test]
    fn stub_flag_is_skipped() {
        let args = ["--stub", "--check-screen"];
        assert_eq!(Mode::parse(args).unwrap(), Mode::CheckScreen);
        assert!(wants_stub(&args));
        assert!(!wants_stub(&["--debug"]));
    }

    #[test]
    fn one_shot_modes() {
        assert!(Mode::Debug.is_one_shot());
        assert!(Mode::CheckScreen.is_one_shot());
        assert!(!Mode::Safe.is_one_shot());
        assert!(!Mode::Rounds(3).is_one_shot());
    }
}
