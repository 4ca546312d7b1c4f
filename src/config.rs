//! Session configuration
//!
//! The handful of settings the protocol engine needs, serialisable to JSON
//! so embedders can persist them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Tn3270Error, Tn3270Result};

/// 3278/3279 terminal models and their alternate screen sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalModel {
    /// 24x80
    Model2,
    /// 32x80
    Model3,
    /// 43x80
    Model4,
    /// 27x132
    Model5,
}

impl TerminalModel {
    /// Alternate screen size as (rows, cols)
    pub fn dimensions(self) -> (usize, usize) {
        match self {
            TerminalModel::Model2 => (24, 80),
            TerminalModel::Model3 => (32, 80),
            TerminalModel::Model4 => (43, 80),
            TerminalModel::Model5 => (27, 132),
        }
    }

    fn model_digit(self) -> char {
        match self {
            TerminalModel::Model2 => '2',
            TerminalModel::Model3 => '3',
            TerminalModel::Model4 => '4',
            TerminalModel::Model5 => '5',
        }
    }
}

/// Line terminator appended to NVT cooked-mode lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    /// CR LF, the TELNET default
    Crlf,
    /// CR NUL
    Cr,
    /// Bare LF
    Lf,
}

impl LineEnding {
    pub fn bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Crlf => b"\r\n",
            LineEnding::Cr => b"\r\0",
            LineEnding::Lf => b"\n",
        }
    }
}

/// Connection and terminal settings for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub model: TerminalModel,
    /// Advertise extended data stream support (the -E suffix)
    pub extended: bool,
    /// Offer the TN3270E option during negotiation
    pub tn3270e: bool,
    /// Overrides the terminal type derived from the model
    pub terminal_type_override: Option<String>,
    pub line_ending: LineEnding,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            host: String::new(),
            port: 23,
            model: TerminalModel::Model2,
            extended: true,
            tn3270e: true,
            terminal_type_override: None,
            line_ending: LineEnding::Crlf,
            connect_timeout_secs: 10,
        }
    }
}

impl SessionConfig {
    /// Terminal type string reported in TTYPE and TN3270E DEVICE-TYPE
    pub fn terminal_type(&self) -> String {
        if let Some(ref t) = self.terminal_type_override {
            return t.clone();
        }
        let mut t = format!("IBM-3278-{}", self.model.model_digit());
        if self.extended {
            t.push_str("-E");
        }
        t
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue {
                setting: "host",
                value: String::new(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                setting: "port",
                value: self.port.to_string(),
            });
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Tn3270Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&text).map_err(|e| {
            Tn3270Error::Config(ConfigError::Parse {
                message: e.to_string(),
            })
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Tn3270Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| {
            Tn3270Error::Config(ConfigError::Parse {
                message: e.to_string(),
            })
        })?;
        fs::write(path, text)?;
        Ok(())
    }
}
