use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Point, Region, RetryConfig, ScreenState};

/// Top-level configuration loaded from `~/.auto-kingdom/config.toml`.
///
/// Every section is optional in the file; missing sections and fields fall
/// back to the defaults below, which match a 1280x720 emulator profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub character_grid: CharacterGridConfig,
    #[serde(default)]
    pub screens: ScreensConfig,
    #[serde(default = "default_automations")]
    pub automations: Vec<AutomationConfig>,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            device: DeviceConfig::default(),
            game: GameConfig::default(),
            timing: TimingConfig::default(),
            retry: RetrySection::default(),
            recovery: RecoveryConfig::default(),
            navigation: NavigationConfig::default(),
            character_grid: CharacterGridConfig::default(),
            screens: ScreensConfig::default(),
            automations: default_automations(),
            instances: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from `~/.auto-kingdom/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.character_grid.validate()?;
        if self.recovery.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "recovery.max_attempts must be at least 1".into(),
            ));
        }
        if self.timing.load_poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "timing.load_poll_interval_secs must be at least 1".into(),
            ));
        }

        let mut names = HashSet::new();
        for automation in &self.automations {
            if !names.insert(automation.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate automation name '{}'",
                    automation.name
                )));
            }
            if automation.steps.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "automation '{}' has no steps",
                    automation.name
                )));
            }
        }

        let mut ids = HashSet::new();
        for instance in &self.instances {
            if instance.id.trim().is_empty() {
                return Err(ConfigError::Validation("instance id must not be empty".into()));
            }
            if !ids.insert(instance.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate instance id '{}'",
                    instance.id
                )));
            }
        }
        Ok(())
    }

    /// Look up a configured instance by id.
    pub fn instance(&self, id: &str) -> Option<&InstanceConfig> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// Directory holding per-instance tracker and schedule files, with a
    /// leading `~` expanded to the home directory.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".auto-kingdom")
            .join("config.toml")
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_data_dir() -> String {
    "~/.auto-kingdom/instances".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
    #[serde(default = "default_tesseract_path")]
    pub tesseract_path: String,
    /// Tesseract page segmentation modes tried in order before a keyword is
    /// declared absent.
    #[serde(default = "default_ocr_variants")]
    pub ocr_page_modes: Vec<u8>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            tesseract_path: default_tesseract_path(),
            ocr_page_modes: default_ocr_variants(),
        }
    }
}

fn default_adb_path() -> String {
    "adb".into()
}
fn default_tesseract_path() -> String {
    "tesseract".into()
}
fn default_ocr_variants() -> Vec<u8> {
    vec![6, 11, 3]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_package_name")]
    pub package_name: String,
    #[serde(default = "default_activity_name")]
    pub activity_name: String,
    #[serde(default = "default_game_load_wait")]
    pub game_load_wait_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            package_name: default_package_name(),
            activity_name: default_activity_name(),
            game_load_wait_secs: default_game_load_wait(),
        }
    }
}

fn default_package_name() -> String {
    "com.lilithgame.roc.gp".into()
}
fn default_activity_name() -> String {
    "com.harry.engine.MainActivity".into()
}
fn default_game_load_wait() -> u64 {
    30
}

/// Settle delays and poll bounds used by the cycle orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_click_delay_ms")]
    pub click_delay_ms: u64,
    /// Pause after clicking an entity's slot before looking for the prompt.
    #[serde(default = "default_selection_settle")]
    pub selection_settle_secs: u64,
    #[serde(default = "default_menu_step_delay")]
    pub menu_step_delay_secs: u64,
    #[serde(default = "default_selection_screen_delay")]
    pub selection_screen_delay_secs: u64,
    #[serde(default = "default_scroll_settle")]
    pub scroll_settle_secs: u64,
    #[serde(default = "default_load_poll_interval")]
    pub load_poll_interval_secs: u64,
    #[serde(default = "default_load_max_wait")]
    pub load_max_wait_secs: u64,
    #[serde(default = "default_post_load_buffer")]
    pub post_load_buffer_secs: u64,
    #[serde(default = "default_dismiss_settle")]
    pub dismiss_settle_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            click_delay_ms: default_click_delay_ms(),
            selection_settle_secs: default_selection_settle(),
            menu_step_delay_secs: default_menu_step_delay(),
            selection_screen_delay_secs: default_selection_screen_delay(),
            scroll_settle_secs: default_scroll_settle(),
            load_poll_interval_secs: default_load_poll_interval(),
            load_max_wait_secs: default_load_max_wait(),
            post_load_buffer_secs: default_post_load_buffer(),
            dismiss_settle_secs: default_dismiss_settle(),
        }
    }
}

impl TimingConfig {
    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }

    /// All delays zeroed. Used by tests and dry runs.
    pub fn instant() -> Self {
        Self {
            click_delay_ms: 0,
            selection_settle_secs: 0,
            menu_step_delay_secs: 0,
            selection_screen_delay_secs: 0,
            scroll_settle_secs: 0,
            load_poll_interval_secs: 1,
            load_max_wait_secs: 0,
            post_load_buffer_secs: 0,
            dismiss_settle_secs: 0,
        }
    }
}

fn default_click_delay_ms() -> u64 {
    1000
}
fn default_selection_settle() -> u64 {
    3
}
fn default_menu_step_delay() -> u64 {
    2
}
fn default_selection_screen_delay() -> u64 {
    6
}
fn default_scroll_settle() -> u64 {
    2
}
fn default_load_poll_interval() -> u64 {
    2
}
fn default_load_max_wait() -> u64 {
    30
}
fn default_post_load_buffer() -> u64 {
    5
}
fn default_dismiss_settle() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_true")]
    pub recover_to_home: bool,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_between_retries_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            recover_to_home: true,
            delay_between_retries_ms: default_retry_delay_ms(),
        }
    }
}

impl RetrySection {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.max_retries,
            self.recover_to_home,
            Duration::from_millis(self.delay_between_retries_ms),
        )
    }
}

fn default_max_retries() -> u32 {
    2
}
fn default_true() -> bool {
    true
}
fn default_retry_delay_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_map_settle_ms")]
    pub map_settle_ms: u64,
    #[serde(default = "default_dismiss_settle_ms")]
    pub dismiss_settle_ms: u64,
    #[serde(default = "default_login_extra_buffer_ms")]
    pub login_extra_buffer_ms: u64,
    #[serde(default = "default_unknown_settle_ms")]
    pub unknown_settle_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            map_settle_ms: default_map_settle_ms(),
            dismiss_settle_ms: default_dismiss_settle_ms(),
            login_extra_buffer_ms: default_login_extra_buffer_ms(),
            unknown_settle_ms: default_unknown_settle_ms(),
        }
    }
}

impl RecoveryConfig {
    pub fn instant() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            map_settle_ms: 0,
            dismiss_settle_ms: 0,
            login_extra_buffer_ms: 0,
            unknown_settle_ms: 0,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}
fn default_map_settle_ms() -> u64 {
    2000
}
fn default_dismiss_settle_ms() -> u64 {
    1000
}
fn default_login_extra_buffer_ms() -> u64 {
    1000
}
fn default_unknown_settle_ms() -> u64 {
    1500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "default_avatar_icon")]
    pub avatar_icon: Point,
    #[serde(default = "default_settings_icon")]
    pub settings_icon: Point,
    #[serde(default = "default_characters_icon")]
    pub characters_icon: Point,
    #[serde(default = "default_yes_button")]
    pub yes_button: Point,
    #[serde(default = "default_map_button")]
    pub map_button: Point,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            avatar_icon: default_avatar_icon(),
            settings_icon: default_settings_icon(),
            characters_icon: default_characters_icon(),
            yes_button: default_yes_button(),
            map_button: default_map_button(),
        }
    }
}

fn default_avatar_icon() -> Point {
    Point::new(50, 50)
}
fn default_settings_icon() -> Point {
    Point::new(1109, 581)
}
fn default_characters_icon() -> Point {
    Point::new(350, 370)
}
fn default_yes_button() -> Point {
    Point::new(778, 485)
}
fn default_map_button() -> Point {
    Point::new(62, 655)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwipeConfig {
    pub start: Point,
    pub end: Point,
    #[serde(default = "default_swipe_duration")]
    pub duration_ms: u64,
}

fn default_swipe_duration() -> u64 {
    500
}

/// Where each entity's slot sits on the character selection screen.
///
/// Entities are laid out `slots_per_page` to a page. Page 0 uses
/// `first_page`; any later page is reached by swiping `scroll` once per page
/// and uses `after_scroll`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterGridConfig {
    #[serde(default = "default_slots_per_page")]
    pub slots_per_page: u32,
    #[serde(default = "default_first_page")]
    pub first_page: Vec<Point>,
    #[serde(default = "default_after_scroll")]
    pub after_scroll: Vec<Point>,
    #[serde(default = "default_grid_scroll")]
    pub scroll: SwipeConfig,
}

impl Default for CharacterGridConfig {
    fn default() -> Self {
        Self {
            slots_per_page: default_slots_per_page(),
            first_page: default_first_page(),
            after_scroll: default_after_scroll(),
            scroll: default_grid_scroll(),
        }
    }
}

impl CharacterGridConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.slots_per_page == 0 {
            return Err(ConfigError::Validation(
                "character_grid.slots_per_page must be at least 1".into(),
            ));
        }
        let needed = self.slots_per_page as usize;
        if self.first_page.len() < needed || self.after_scroll.len() < needed {
            return Err(ConfigError::Validation(format!(
                "character_grid pages need {needed} slots each (first_page has {}, after_scroll has {})",
                self.first_page.len(),
                self.after_scroll.len()
            )));
        }
        Ok(())
    }

    /// Page index and on-screen slot for an entity.
    pub fn locate(&self, entity: u32) -> (u32, Point) {
        let page = entity / self.slots_per_page;
        let slot = (entity % self.slots_per_page) as usize;
        let point = if page == 0 {
            self.first_page[slot]
        } else {
            self.after_scroll[slot]
        };
        (page, point)
    }
}

fn default_slots_per_page() -> u32 {
    6
}
fn default_first_page() -> Vec<Point> {
    vec![
        Point::new(450, 330),
        Point::new(970, 330),
        Point::new(450, 480),
        Point::new(970, 480),
        Point::new(450, 630),
        Point::new(970, 630),
    ]
}
fn default_after_scroll() -> Vec<Point> {
    vec![
        Point::new(450, 250),
        Point::new(970, 250),
        Point::new(450, 400),
        Point::new(970, 400),
        Point::new(450, 550),
        Point::new(970, 550),
    ]
}
fn default_grid_scroll() -> SwipeConfig {
    SwipeConfig {
        start: Point::new(700, 640),
        end: Point::new(700, 200),
        duration_ms: 800,
    }
}

/// Keywords plus the region they are expected in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub keywords: Vec<String>,
    pub region: Region,
}

impl ProbeConfig {
    fn new(keywords: &[&str], region: Region) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            region,
        }
    }
}

/// Presence probes for each classified screen plus the loading signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreensConfig {
    #[serde(default = "default_character_login_probe")]
    pub character_login: ProbeConfig,
    #[serde(default = "default_alliance_menu_probe")]
    pub alliance_menu: ProbeConfig,
    #[serde(default = "default_home_village_probe")]
    pub home_village: ProbeConfig,
    #[serde(default = "default_map_screen_probe")]
    pub map_screen: ProbeConfig,
    #[serde(default = "default_dialog_open_probe")]
    pub dialog_open: ProbeConfig,
    #[serde(default = "default_loading_probe")]
    pub loading: ProbeConfig,
}

impl Default for ScreensConfig {
    fn default() -> Self {
        Self {
            character_login: default_character_login_probe(),
            alliance_menu: default_alliance_menu_probe(),
            home_village: default_home_village_probe(),
            map_screen: default_map_screen_probe(),
            dialog_open: default_dialog_open_probe(),
            loading: default_loading_probe(),
        }
    }
}

impl ScreensConfig {
    /// Probe for a classified state. `Unknown` has none.
    pub fn probe_for(&self, state: ScreenState) -> Option<&ProbeConfig> {
        match state {
            ScreenState::CharacterLogin => Some(&self.character_login),
            ScreenState::AllianceMenu => Some(&self.alliance_menu),
            ScreenState::HomeVillage => Some(&self.home_village),
            ScreenState::MapScreen => Some(&self.map_screen),
            ScreenState::DialogOpen => Some(&self.dialog_open),
            ScreenState::Unknown => None,
        }
    }
}

fn default_character_login_probe() -> ProbeConfig {
    ProbeConfig::new(&["Character Login", "Log in"], Region::new(380, 180, 520, 120))
}
fn default_alliance_menu_probe() -> ProbeConfig {
    ProbeConfig::new(&["Technology", "Territory"], Region::new(150, 420, 980, 220))
}
fn default_home_village_probe() -> ProbeConfig {
    ProbeConfig::new(
        &["Feudal Age", "Dark Age", "Iron Age", "Bronze Age", "Stone Age"],
        Region::new(0, 0, 420, 120),
    )
}
fn default_map_screen_probe() -> ProbeConfig {
    ProbeConfig::new(&["3174", "1960", "3494"], Region::new(0, 0, 420, 120))
}
fn default_dialog_open_probe() -> ProbeConfig {
    ProbeConfig::new(
        &["Campaign", "Items", "Alliance", "Commander", "Mail"],
        Region::new(560, 620, 720, 100),
    )
}
fn default_loading_probe() -> ProbeConfig {
    ProbeConfig::new(&["Loading"], Region::new(440, 600, 400, 120))
}

// ---------------------------------------------------------------------------
// Automations
// ---------------------------------------------------------------------------

/// How often a scripted subtask runs for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    /// At most once per entity per UTC day, gated by the task tracker.
    Daily,
    /// Every cycle, independent of the tracker.
    EveryCycle,
}

/// One instruction of a scripted subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Click {
        point: Point,
        #[serde(default = "default_one")]
        times: u32,
        #[serde(default)]
        delay_ms: Option<u64>,
    },
    Swipe {
        from: Point,
        to: Point,
        #[serde(default = "default_swipe_duration")]
        duration_ms: u64,
    },
    Dismiss {
        #[serde(default = "default_one")]
        count: u32,
    },
    Wait {
        ms: u64,
    },
    /// Click the located text (shifted by `offset`), else `fallback`. With
    /// neither, the step fails when `required` and is skipped otherwise.
    TapText {
        keywords: Vec<String>,
        region: Region,
        #[serde(default)]
        offset: Option<Point>,
        #[serde(default)]
        fallback: Option<Point>,
        #[serde(default = "default_true")]
        required: bool,
    },
    /// Fail the subtask unless the text is present.
    ExpectText {
        keywords: Vec<String>,
        region: Region,
    },
    /// Toggle to the world map unless it is already showing.
    NavigateToMap,
}

fn default_one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationConfig {
    pub name: String,
    pub cadence: Cadence,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub steps: Vec<Step>,
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_automations() -> Vec<AutomationConfig> {
    vec![
        AutomationConfig {
            name: crate::tracker::TASK_BUILD.into(),
            cadence: Cadence::Daily,
            enabled: true,
            steps: vec![
                Step::NavigateToMap,
                Step::Click {
                    point: Point::new(690, 30),
                    times: 1,
                    delay_ms: Some(2000),
                },
                Step::TapText {
                    keywords: keywords(&["troop"]),
                    region: Region::new(300, 150, 700, 450),
                    offset: None,
                    fallback: None,
                    required: true,
                },
                Step::TapText {
                    keywords: keywords(&["remaining", "time"]),
                    region: Region::new(350, 200, 600, 400),
                    offset: Some(Point::new(0, 60)),
                    fallback: None,
                    required: true,
                },
                Step::TapText {
                    keywords: keywords(&["tap"]),
                    region: Region::new(350, 250, 600, 350),
                    offset: None,
                    fallback: None,
                    required: true,
                },
                Step::TapText {
                    keywords: keywords(&["Dispatch"]),
                    region: Region::new(900, 100, 380, 500),
                    offset: Some(Point::new(0, 90)),
                    fallback: None,
                    required: true,
                },
                Step::Click {
                    point: Point::new(1180, 160),
                    times: 1,
                    delay_ms: Some(2000),
                },
                Step::Click {
                    point: Point::new(960, 640),
                    times: 1,
                    delay_ms: Some(2000),
                },
            ],
        },
        AutomationConfig {
            name: crate::tracker::TASK_EXPEDITION.into(),
            cadence: Cadence::Daily,
            enabled: true,
            steps: vec![
                Step::Click {
                    point: Point::new(1230, 660),
                    times: 1,
                    delay_ms: Some(1000),
                },
                Step::Click {
                    point: Point::new(690, 665),
                    times: 1,
                    delay_ms: Some(2000),
                },
                Step::TapText {
                    keywords: keywords(&["Expedition"]),
                    region: Region::new(0, 100, 1280, 560),
                    offset: None,
                    fallback: Some(Point::new(640, 360)),
                    required: true,
                },
                Step::Click {
                    point: Point::new(125, 125),
                    times: 1,
                    delay_ms: Some(1000),
                },
                Step::Click {
                    point: Point::new(988, 277),
                    times: 3,
                    delay_ms: Some(500),
                },
                Step::Dismiss { count: 1 },
                Step::Click {
                    point: Point::new(124, 223),
                    times: 1,
                    delay_ms: Some(1500),
                },
                Step::Dismiss { count: 3 },
                Step::Wait { ms: 3000 },
            ],
        },
        AutomationConfig {
            name: "donation".into(),
            cadence: Cadence::EveryCycle,
            enabled: true,
            steps: vec![
                Step::Click {
                    point: Point::new(1230, 660),
                    times: 1,
                    delay_ms: Some(1000),
                },
                Step::Click {
                    point: Point::new(880, 665),
                    times: 1,
                    delay_ms: Some(2000),
                },
                Step::ExpectText {
                    keywords: keywords(&["Technology", "Territory"]),
                    region: Region::new(150, 420, 980, 220),
                },
                Step::TapText {
                    keywords: keywords(&["Technology"]),
                    region: Region::new(150, 420, 980, 220),
                    offset: None,
                    fallback: Some(Point::new(510, 560)),
                    required: true,
                },
                Step::Wait { ms: 6000 },
                Step::TapText {
                    keywords: keywords(&["Officer's Recommendation", "Recommendation", "mendation"]),
                    region: Region::new(100, 100, 1080, 520),
                    offset: Some(Point::new(0, 80)),
                    fallback: None,
                    required: true,
                },
                Step::Click {
                    point: Point::new(1000, 585),
                    times: 20,
                    delay_ms: Some(500),
                },
                Step::Dismiss { count: 3 },
            ],
        },
    ]
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

/// One managed emulator instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `adb -s` serial, e.g. `127.0.0.1:5555`.
    pub adb_serial: String,
    #[serde(default = "default_one")]
    pub entity_count: u32,
    #[serde(default)]
    pub start_index: u32,
    /// Command spawned to boot the emulator before the run, if any.
    #[serde(default)]
    pub emulator_command: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub exit_after_complete: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl InstanceConfig {
    pub fn new(id: impl Into<String>, adb_serial: impl Into<String>, entity_count: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            adb_serial: adb_serial.into(),
            entity_count,
            start_index: 0,
            emulator_command: None,
            exit_after_complete: true,
            enabled: true,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_locates_pages_and_slots() {
        let grid = CharacterGridConfig::default();
        assert_eq!(grid.locate(0), (0, Point::new(450, 330)));
        assert_eq!(grid.locate(5), (0, Point::new(970, 630)));
        assert_eq!(grid.locate(6), (1, Point::new(450, 250)));
        assert_eq!(grid.locate(13), (2, Point::new(970, 250)));
    }

    #[test]
    fn short_grid_page_fails_validation() {
        let mut cfg = Config::default();
        cfg.character_grid.after_scroll.truncate(3);
        let err = cfg.validate().expect_err("validation should fail");
        assert!(err.to_string().contains("character_grid"));
    }

    #[test]
    fn home_expansion() {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        assert_eq!(expand_home("~/x/y"), home.join("x/y"));
        assert_eq!(expand_home("/abs/dir"), PathBuf::from("/abs/dir"));
    }

    #[test]
    fn probe_lookup_covers_every_known_state() {
        let screens = ScreensConfig::default();
        for state in ScreenState::ALL {
            assert_eq!(screens.probe_for(state).is_some(), state != ScreenState::Unknown);
        }
    }
}
