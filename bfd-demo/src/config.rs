//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bfd_engine::EngineConfig;
use serde::Deserialize;

/// Demo-level configuration: the engine's own config plus the handful of
/// knobs an operator would set on the command line in a real deployment.
/// Everything below `engine` stands in for the external REST/CLI surface
/// the core itself never sees.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    pub logging: Logging,
    pub peer: Peer,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub stdout: LoggingStdout,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
    pub style: LoggingStyle,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingStyle {
    Compact,
    Full,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Peer {
    pub remote_ip: String,
    pub port: u16,
    pub tx_interval_us: u32,
    pub detect_multiplier: u8,
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/bfd-demo.toml";

    pub fn load(config_file: Option<&str>) -> Config {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => toml::from_str(&config_str)
                .expect("failed to parse configuration file"),
            Err(err) => {
                eprintln!("failed to load configuration file: {err}");
                eprintln!("falling back to default configuration...");
                Config::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            engine: EngineConfig::default(),
            logging: Default::default(),
            peer: Default::default(),
        }
    }
}

impl Default for Logging {
    fn default() -> Logging {
        Logging {
            stdout: Default::default(),
        }
    }
}

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout {
            enabled: true,
            style: LoggingStyle::Compact,
        }
    }
}

impl Default for Peer {
    fn default() -> Peer {
        Peer {
            remote_ip: "127.0.0.1".to_owned(),
            port: 3784,
            tx_interval_us: 200_000,
            detect_multiplier: 3,
        }
    }
}
