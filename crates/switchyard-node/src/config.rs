//! Node configuration.
//!
//! Configuration can be loaded from:
//! - A file named by `SWITCHYARD_CONFIG`
//! - TOML configuration file in one of the default locations
//! - Environment variables (SWITCHYARD_*) for the defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use switchyard_core::{BusConfig, VariantDelivery};
use switchyard_gateway::Encoding;

/// Node configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Control-service gateway.
    #[serde(default)]
    pub gateway: GatewaySection,

    /// Vehicle driver.
    #[serde(default)]
    pub vehicle: VehicleSection,

    /// Topic bus behaviour.
    #[serde(default)]
    pub bus: BusSection,

    /// Diagnostics HTTP endpoint.
    #[serde(default)]
    pub http: HttpSection,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsSection,

    /// Operator input bindings.
    #[serde(default)]
    pub input: InputSection,
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySection {
    /// Connect to the control service.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// WebSocket URL of the control service.
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Token sent in the `authorize` frame.
    #[serde(default = "default_auth_token")]
    pub auth_token: Option<String>,

    /// Delay between reconnect attempts in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Encoding for outgoing frames.
    #[serde(default)]
    pub encoding: Encoding,

    /// Outbound frames held while the link is busy.
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

/// Vehicle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSection {
    /// Driver name: `traxxas` or `none`.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Vehicle receiver host.
    #[serde(default = "default_vehicle_host")]
    pub host: String,

    /// Vehicle receiver port.
    #[serde(default = "default_vehicle_port")]
    pub port: u16,

    /// Largest throttle magnitude passed to the driver.
    #[serde(default = "default_limit")]
    pub max_throttle: i32,

    /// Largest steering magnitude passed to the driver.
    #[serde(default = "default_limit")]
    pub max_steering: i32,

    /// Give up on a vehicle connect after this many milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSection {
    /// How transformer variants are delivered.
    #[serde(default)]
    pub variant_delivery: VariantDelivery,

    /// Maximum nesting of re-dispatched variants.
    #[serde(default = "default_max_variant_depth")]
    pub max_variant_depth: usize,
}

/// HTTP diagnostics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSection {
    /// Serve the diagnostics endpoint.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host to bind to.
    #[serde(default = "default_http_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSection {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Input names the operator may bind, with the control each one defaults to.
///
/// ```toml
/// [input.keyboard]
/// kill_switch = "Space"
///
/// [input.gamepad]
/// kill_switch = 1
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSection {
    /// Keyboard inputs by name, mapped to a key name.
    #[serde(default = "default_keyboard_inputs")]
    pub keyboard: BTreeMap<String, String>,

    /// Gamepad inputs by name, mapped to a button or axis index.
    #[serde(default)]
    pub gamepad: BTreeMap<String, u8>,
}

// Default value functions
fn env_or(name: &str, fallback: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| fallback.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, fallback: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn default_true() -> bool {
    true
}

fn default_gateway_url() -> String {
    env_or("SWITCHYARD_GATEWAY_URL", "ws://127.0.0.1:8080/ws")
}

fn default_auth_token() -> Option<String> {
    std::env::var("SWITCHYARD_AUTH_TOKEN").ok()
}

fn default_reconnect_delay() -> u64 {
    1_000 // 1 second
}

fn default_outbox_capacity() -> usize {
    64
}

fn default_connect_timeout() -> u64 {
    env_parse("SWITCHYARD_VEHICLE_CONNECT_TIMEOUT_MS", 1_000)
}

fn default_keyboard_inputs() -> BTreeMap<String, String> {
    BTreeMap::from([("kill_switch".to_string(), "Space".to_string())])
}

fn default_driver() -> String {
    env_or("SWITCHYARD_VEHICLE_DRIVER", "traxxas")
}

fn default_vehicle_host() -> String {
    env_or("SWITCHYARD_VEHICLE_HOST", "192.168.2.1")
}

fn default_vehicle_port() -> u16 {
    env_parse("SWITCHYARD_VEHICLE_PORT", 6000)
}

fn default_limit() -> i32 {
    255
}

fn default_max_variant_depth() -> usize {
    8
}

fn default_http_host() -> String {
    env_or("SWITCHYARD_HTTP_HOST", "127.0.0.1")
}

fn default_http_port() -> u16 {
    env_parse("SWITCHYARD_HTTP_PORT", 8081)
}

fn default_metrics_port() -> u16 {
    env_parse("SWITCHYARD_METRICS_PORT", 9090)
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_gateway_url(),
            auth_token: default_auth_token(),
            reconnect_delay_ms: default_reconnect_delay(),
            encoding: Encoding::default(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

impl Default for VehicleSection {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            host: default_vehicle_host(),
            port: default_vehicle_port(),
            max_throttle: default_limit(),
            max_steering: default_limit(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            keyboard: default_keyboard_inputs(),
            gamepad: BTreeMap::new(),
        }
    }
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            variant_delivery: VariantDelivery::default(),
            max_variant_depth: default_max_variant_depth(),
        }
    }
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("SWITCHYARD_CONFIG") {
            return Self::from_file(shellexpand::tilde(&path).as_ref());
        }

        // Try to load from default paths
        let config_paths = [
            "switchyard.toml",
            "/etc/switchyard/switchyard.toml",
            "~/.config/switchyard/switchyard.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

impl GatewaySection {
    /// Gateway settings for the run loop.
    #[must_use]
    pub fn gateway_config(&self) -> switchyard_gateway::GatewayConfig {
        switchyard_gateway::GatewayConfig {
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            auth_token: self.auth_token.clone(),
            outbox_capacity: self.outbox_capacity,
        }
    }
}

impl VehicleSection {
    /// `host:port` of the vehicle receiver.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Vehicle connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl BusSection {
    /// Bus settings.
    #[must_use]
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            variant_delivery: self.variant_delivery,
            max_variant_depth: self.max_variant_depth,
        }
    }
}

impl HttpSection {
    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid http address {}:{}", self.host, self.port))
    }
}
