use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::{
    config::ConfigLoadOption,
    dump::{
        filter::{NameFilter, ObjectFilter},
        stateless::StatelessConfig,
        DumpConfig, DEFAULT_MAX_CONCURRENCY,
    },
    kube::ConnectionConfig,
    logging::LoggerConfig,
};

use super::args::Toggle;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Command {
    /// kubeconfig path. Defaults to $KUBECONFIG, ~/.kube/config or the in-cluster config
    #[arg(short = 'C', long, env = "CONFIG", display_order = 1000)]
    pub kubeconfig: Option<PathBuf>,

    /// Context from the kubeconfig. Defaults to the current context
    #[arg(short, long, env = "CONTEXT", display_order = 1000)]
    pub context: Option<String>,

    /// Output directory for the dumps
    #[arg(short, long, env = "DIR", default_value = "dump", display_order = 1000)]
    pub dir: PathBuf,

    /// Resources to dump (e.g. -r configmaps,secrets). Empty for all
    #[arg(
        short,
        long,
        env = "RESOURCES",
        value_delimiter = ',',
        display_order = 1000
    )]
    pub resources: Vec<String>,

    /// Resources to ignore (e.g. --ignore-resources configmaps,secrets)
    #[arg(
        long,
        env = "IGNORE_RESOURCES",
        value_delimiter = ',',
        display_order = 1000
    )]
    pub ignore_resources: Vec<String>,

    /// Namespaces to dump (e.g. -n ns1,ns2). Empty for all
    #[arg(
        short,
        long,
        env = "NAMESPACES",
        value_delimiter = ',',
        display_order = 1000
    )]
    pub namespaces: Vec<String>,

    /// Namespaces to ignore (e.g. --ignore-namespaces ns1,ns2)
    #[arg(
        long,
        env = "IGNORE_NAMESPACES",
        value_delimiter = ',',
        display_order = 1000
    )]
    pub ignore_namespaces: Vec<String>,

    /// Dump cluster-wide resources
    #[arg(
        long,
        env = "CLUSTERSCOPED",
        value_name = "true|false",
        num_args = 0..=1,
        require_equals = true,
        default_value_t = Toggle::True,
        default_missing_value = "true",
        hide_possible_values = true,
        ignore_case = true,
        value_enum,
        display_order = 1000
    )]
    pub clusterscoped: Toggle,

    /// Dump namespaced resources
    #[arg(
        long,
        env = "NAMESPACED",
        value_name = "true|false",
        num_args = 0..=1,
        require_equals = true,
        default_value_t = Toggle::True,
        default_missing_value = "true",
        hide_possible_values = true,
        ignore_case = true,
        value_enum,
        display_order = 1000
    )]
    pub namespaced: Toggle,

    /// Remove fields containing a state of the resource
    #[arg(
        long,
        env = "STATELESS",
        value_name = "true|false",
        num_args = 0..=1,
        require_equals = true,
        default_value_t = Toggle::True,
        default_missing_value = "true",
        hide_possible_values = true,
        ignore_case = true,
        value_enum,
        display_order = 1000
    )]
    pub stateless: Toggle,

    /// Maximum number of resources dumped in parallel (minimum 1)
    #[arg(
        short,
        long,
        env = "THREADS",
        default_value_t = DEFAULT_MAX_CONCURRENCY as u64,
        value_parser = clap::value_parser!(u64).range(1..),
        display_order = 1000
    )]
    pub threads: u64,

    /// Verbosity of the output (0-3)
    #[arg(
        short,
        long,
        env = "VERBOSITY",
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(0..=3),
        display_order = 1000
    )]
    pub verbosity: u8,

    /// Also write JSON log lines to this file
    #[arg(long, env = "LOG_FILE", display_order = 1000)]
    pub log_file: Option<PathBuf>,

    /// Config file path
    #[arg(long, env = "KUBEDUMP_CONFIG_FILE", display_order = 1000)]
    pub config_file: Option<PathBuf>,
}

impl Command {
    pub fn init() -> Self {
        Self::parse()
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        let Self {
            kubeconfig,
            context,
            ..
        } = self.clone();

        ConnectionConfig {
            kubeconfig,
            context,
        }
    }

    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            verbosity: self.verbosity,
            log_file: self.log_file.clone(),
        }
    }

    pub fn dump_config(&self, stateless: StatelessConfig) -> DumpConfig {
        DumpConfig {
            out_dir: self.dir.clone(),
            resources: NameFilter::new(&self.resources, &self.ignore_resources),
            objects: ObjectFilter {
                clusterscoped: self.clusterscoped.into(),
                namespaced: self.namespaced.into(),
                namespaces: NameFilter::new(&self.namespaces, &self.ignore_namespaces),
            },
            stateless: bool::from(self.stateless).then_some(stateless),
            max_concurrency: self.threads as usize,
        }
    }

    pub fn config_load_option(&self) -> Result<ConfigLoadOption> {
        let option = if let Some(path) = &self.config_file {
            match path.try_exists() {
                Ok(true) => ConfigLoadOption::Path(path.clone()),
                Ok(false) => {
                    eprintln!("Config file not found: {:?}", path);

                    ConfigLoadOption::Default
                }
                Err(err) => {
                    eprintln!("Failed to check config file exists: {}", err);

                    ConfigLoadOption::Default
                }
            }
        } else {
            match xdg_config_home().map(|dir| dir.join("config.yaml")) {
                Some(path) => match path.try_exists() {
                    Ok(true) => ConfigLoadOption::Path(path),
                    Ok(false) => ConfigLoadOption::Default,
                    Err(err) => {
                        eprintln!("Failed to check config file exists: {}", err);

                        ConfigLoadOption::Default
                    }
                },
                None => ConfigLoadOption::Default,
            }
        };

        Ok(option)
    }
}

fn xdg_config_home() -> Option<PathBuf> {
    match std::env::var_os("XDG_CONFIG_HOME").map(|s| PathBuf::from(s).join("kubedump")) {
        Some(path) => Some(path),
        None => dirs::home_dir().map(|home| home.join(".config").join("kubedump")),
    }
}
