use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatepassConfig {
    pub camera: CameraConfig,
    pub decoder: DecoderConfig,
    pub api: ApiConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Device index of the environment-facing (rear) camera, e.g. 0 for /dev/video0
    #[serde(default = "default_device_index")]
    pub device_index: u32,

    /// Device index of the user-facing camera, if the host has one
    #[serde(default)]
    pub user_device_index: Option<u32>,

    /// Ideal capture resolution (width, height); the platform may return less
    #[serde(default = "default_ideal_resolution")]
    pub ideal_resolution: (u32, u32),

    /// Requested frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Scan a still image instead of a live camera
    #[serde(default)]
    pub still_image: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DecoderConfig {
    /// Redraw tick interval in milliseconds; one decode attempt per tick
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Use the native decoder when the platform has one
    #[serde(default = "default_prefer_native")]
    pub prefer_native: bool,

    /// Synthesize a payload after a random delay when decoding falls back
    #[serde(default = "default_simulate_unattended")]
    pub simulate_unattended: bool,

    /// Lower bound of the synthesis delay window in milliseconds
    #[serde(default = "default_fallback_min_delay_ms")]
    pub fallback_min_delay_ms: u64,

    /// Upper bound of the synthesis delay window in milliseconds
    #[serde(default = "default_fallback_max_delay_ms")]
    pub fallback_max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Base URL of the visitor management API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the QR validation endpoint
    #[serde(default = "default_validate_path")]
    pub validate_path: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Badge page URL with an `{id}` placeholder; enables sharing when set
    #[serde(default)]
    pub badge_url_template: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Log every published scan event at debug level
    #[serde(default)]
    pub debug_events: bool,
}

impl GatepassConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("gatepass.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.device_index", default_device_index() as i64)?
            .set_default(
                "camera.ideal_resolution",
                vec![
                    default_ideal_resolution().0 as i64,
                    default_ideal_resolution().1 as i64,
                ],
            )?
            .set_default("camera.fps", default_camera_fps() as i64)?
            .set_default("decoder.tick_interval_ms", default_tick_interval_ms() as i64)?
            .set_default("decoder.prefer_native", default_prefer_native())?
            .set_default("decoder.simulate_unattended", default_simulate_unattended())?
            .set_default(
                "decoder.fallback_min_delay_ms",
                default_fallback_min_delay_ms() as i64,
            )?
            .set_default(
                "decoder.fallback_max_delay_ms",
                default_fallback_max_delay_ms() as i64,
            )?
            .set_default("api.base_url", default_base_url())?
            .set_default("api.validate_path", default_validate_path())?
            .set_default("api.timeout_ms", default_timeout_ms() as i64)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.debug_events", false)?
            .add_source(File::with_name(&path_str).required(false))
            // GATEPASS_API__BASE_URL -> api.base_url
            .add_source(
                Environment::with_prefix("GATEPASS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: GatepassConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.ideal_resolution.0 == 0 || self.camera.ideal_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera ideal_resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.decoder.tick_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Decoder tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.decoder.fallback_min_delay_ms > self.decoder.fallback_max_delay_ms {
            return Err(ConfigError::Message(format!(
                "Decoder fallback delay window is inverted: {}ms > {}ms",
                self.decoder.fallback_min_delay_ms, self.decoder.fallback_max_delay_ms
            )));
        }

        if let Err(e) = reqwest::Url::parse(&self.api.base_url) {
            return Err(ConfigError::Message(format!(
                "API base_url '{}' is not a valid URL: {}",
                self.api.base_url, e
            )));
        }

        if self.api.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "API timeout_ms must be greater than 0".to_string(),
            ));
        }

        if let Some(template) = &self.api.badge_url_template {
            if !template.contains("{id}") {
                return Err(ConfigError::Message(
                    "API badge_url_template must contain an {id} placeholder".to_string(),
                ));
            }
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl DecoderConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Synthesis delay window as (min, max)
    pub fn fallback_delay_window(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.fallback_min_delay_ms),
            Duration::from_millis(self.fallback_max_delay_ms),
        )
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GatepassConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            decoder: DecoderConfig::default(),
            api: ApiConfig::default(),
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                debug_events: false,
            },
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: default_device_index(),
            user_device_index: None,
            ideal_resolution: default_ideal_resolution(),
            fps: default_camera_fps(),
            still_image: None,
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            prefer_native: default_prefer_native(),
            simulate_unattended: default_simulate_unattended(),
            fallback_min_delay_ms: default_fallback_min_delay_ms(),
            fallback_max_delay_ms: default_fallback_max_delay_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            validate_path: default_validate_path(),
            timeout_ms: default_timeout_ms(),
            badge_url_template: None,
        }
    }
}

// Default value functions
fn default_device_index() -> u32 {
    0
}
fn default_ideal_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_camera_fps() -> u32 {
    30
}

fn default_tick_interval_ms() -> u64 {
    33
}
fn default_prefer_native() -> bool {
    true
}
fn default_simulate_unattended() -> bool {
    true
}
fn default_fallback_min_delay_ms() -> u64 {
    2000
}
fn default_fallback_max_delay_ms() -> u64 {
    5000
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_validate_path() -> String {
    "/api/visitors/validate-qr".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}

fn default_event_bus_capacity() -> usize {
    64
}
