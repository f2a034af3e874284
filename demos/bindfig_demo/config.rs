//! Configuration records for the bindfig demo application.
//!
//! The root [`DemoConfig`] nests [`ServerConfig`] and [`DisplayConfig`].
//!
//! # Key mapping
//!
//! With the env prefix `BINDFIG_DEMO`:
//!
//! | Field                    | Env var                                 | Flag                         |
//! |--------------------------|-----------------------------------------|------------------------------|
//! | `name`                   | `BINDFIG_DEMO_NAME`                     | `--name`                     |
//! | `verbose`                | `BINDFIG_DEMO_VERBOSE`                  | `--verbose`                  |
//! | `server.host`            | `BINDFIG_DEMO_SERVER_HOST`              | `--server.host`              |
//! | `server.port`            | `BINDFIG_DEMO_SERVER_PORT`              | `--server.port`              |
//! | `server.max_connections` | `BINDFIG_DEMO_SERVER_MAX_CONNECTIONS`   | `--server.max_connections`   |
//! | `server.idle_timeout`    | `BINDFIG_DEMO_SERVER_IDLE_TIMEOUT`      | `--server.idle_timeout`      |
//! | `display.color`          | `BINDFIG_DEMO_DISPLAY_COLOR`            | `--color`                    |
//! | `display.format`         | `BINDFIG_DEMO_DISPLAY_FORMAT`           | `--display.format`           |

use std::time::Duration;

use bindfig::Record;

#[derive(Record, Debug, Default)]
pub struct DemoConfig {
    /// Application name shown in the echo banner.
    #[bind(default = "bindfig-demo")]
    pub name: String,

    /// Enable verbose output.
    #[bind(default = "false")]
    pub verbose: bool,

    /// Extra labels, comma separated.
    pub labels: Vec<String>,

    #[bind(nested)]
    pub server: ServerConfig,

    #[bind(nested)]
    pub display: DisplayConfig,
}

/// Lives under `[server]` in TOML files.
#[derive(Record, Debug, Default)]
pub struct ServerConfig {
    /// Hostname to bind to.
    #[bind(default = "127.0.0.1")]
    pub host: String,

    /// Port number.
    #[bind(default = "3000")]
    pub port: u16,

    /// Maximum number of allowed connections.
    #[bind(default = "100")]
    pub max_connections: u32,

    /// Close connections idle for this long.
    #[bind(default = "90s")]
    pub idle_timeout: Duration,
}

#[derive(Record, Debug, Default)]
pub struct DisplayConfig {
    /// Terminal color for the echo output: red, green, yellow, blue, magenta,
    /// cyan or white.
    #[bind(default = "yellow", flag = "color,exact")]
    pub color: String,

    /// Output format (pretty or plain).
    #[bind(default = "pretty")]
    pub format: String,
}
