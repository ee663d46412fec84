use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ScreenState
// ---------------------------------------------------------------------------

/// What the controlled application currently shows, as far as the
/// classifier can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenState {
    /// The home village. This is the canonical recovery target.
    HomeVillage,
    MapScreen,
    CharacterLogin,
    AllianceMenu,
    DialogOpen,
    Unknown,
}

impl ScreenState {
    /// All variants, in declaration order.
    pub const ALL: [ScreenState; 6] = [
        ScreenState::HomeVillage,
        ScreenState::MapScreen,
        ScreenState::CharacterLogin,
        ScreenState::AllianceMenu,
        ScreenState::DialogOpen,
        ScreenState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenState::HomeVillage => "home_village",
            ScreenState::MapScreen => "map_screen",
            ScreenState::CharacterLogin => "character_login",
            ScreenState::AllianceMenu => "alliance_menu",
            ScreenState::DialogOpen => "dialog_open",
            ScreenState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ScreenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A screen coordinate in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Whether `other` overlaps this region by at least one pixel.
    pub fn intersects(&self, other: &Region) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

/// Retry behaviour bound to one operation.
///
/// Immutable once handed to a retry policy; build a new value to change it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Run the recovery state machine between attempts.
    pub recover_to_home: bool,
    pub delay_between_retries: Duration,
}

impl RetryConfig {
    pub fn new(max_retries: u32, recover_to_home: bool, delay_between_retries: Duration) -> Self {
        Self {
            max_retries,
            recover_to_home,
            delay_between_retries,
        }
    }

    /// Total number of invocations the policy may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            recover_to_home: true,
            delay_between_retries: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// CycleResult
// ---------------------------------------------------------------------------

/// Outcome of one pass over an instance's entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleResult {
    pub successful_count: u32,
    /// Indices whose processing exhausted its retries, in visiting order.
    pub failed_entities: Vec<u32>,
    pub stopped_early: bool,
}

impl CycleResult {
    /// Number of entities that reached a final verdict.
    pub fn processed(&self) -> u32 {
        self.successful_count + self.failed_entities.len() as u32
    }

    /// No failures and no early stop.
    pub fn is_clean(&self) -> bool {
        self.failed_entities.is_empty() && !self.stopped_early
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
