//! Command-line surface shared by every binary embedding the coordinator

use clap::Parser;
use std::path::PathBuf;

use crate::config::{Settings, DEFAULT_SETTINGS_FILE};
use crate::coordinator::Command;
use crate::error::CoordinatorResult;

#[derive(Parser, Debug, Clone)]
#[command(about = "Self-organizing worker pool: check | start | stop | spawn | flush | duty | help")]
pub struct Cli {
    /// Command to run
    #[arg(default_value = "help")]
    pub command: String,

    /// Command arguments (e.g. the count for `spawn`)
    pub args: Vec<String>,

    /// Settings file (YAML)
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: PathBuf,

    /// Store server address, overrides the settings file
    #[arg(long)]
    pub store_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log file, overrides the settings file; `-` logs to stdout
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn command(&self) -> Command {
        Command::from_name(&self.command)
    }

    /// Settings file, then environment, then flags
    pub fn load_settings(&self) -> CoordinatorResult<Settings> {
        let mut settings = Settings::load(&self.settings)?.with_env_overrides();
        if let Some(addr) = &self.store_addr {
            settings.store_addr = addr.clone();
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        if let Some(file) = &self.log_file {
            settings.log_file = (file.as_os_str() != "-").then(|| file.clone());
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Flags to hand on to processes launched for duty
    pub fn forwarded_flags(&self) -> Vec<String> {
        let mut flags = vec!["--settings".to_string(), self.settings.display().to_string()];
        if let Some(addr) = &self.store_addr {
            flags.extend(["--store-addr".to_string(), addr.clone()]);
        }
        if let Some(level) = &self.log_level {
            flags.extend(["--log-level".to_string(), level.clone()]);
        }
        if let Some(file) = &self.log_file {
            flags.extend(["--log-file".to_string(), file.display().to_string()]);
        }
        flags
    }
}
