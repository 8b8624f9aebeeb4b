/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A template hit on the screen, in capture-space pixels.
///
/// A lookup that finds nothing is `None` rather than a rectangle with a
/// `found` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl MatchResult {
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    /// Center of the rectangle, truncated to whole pixels.
    pub fn center(&self) -> (i32, i32) {
        (
            self.left + (self.width / 2) as i32,
            self.top + (self.height / 2) as i32,
        )
    }
}

/// Pointer target in input-space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickPoint {
    pub x: i32,
    pub y: i32,
}

impl ClickPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for ClickPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Which button the round loop is currently polling for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    SeekingStart,
    SeekingEnd,
}

impl RoundState {
    pub fn label(&self) -> &'static str {
        match self {
            RoundState::SeekingStart => "seeking start",
            RoundState::SeekingEnd => "seeking end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounters {
    /// Incremented only on a confirmed end-button click in the main loop.
    pub rounds_completed: u32,
    pub consecutive_start_failures: u32,
}
