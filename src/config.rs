use std::path::PathBuf;

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::dump::stateless::StatelessConfig;

#[derive(Debug, Default)]
pub enum ConfigLoadOption {
    #[default]
    Default,

    Path(PathBuf),
}

#[derive(Default, Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub stateless: StatelessConfig,
}

impl Config {
    pub fn load(option: ConfigLoadOption) -> Result<Self> {
        let figment = Figment::new();

        let config = match option {
            ConfigLoadOption::Default => figment.merge(Serialized::defaults(Self::default())),
            ConfigLoadOption::Path(path) => figment
                .merge(Serialized::defaults(Self::default()))
                .merge(Yaml::file(path)),
        }
        .merge(Env::prefixed("KUBEDUMP_").split("__"))
        .extract_lossy()?;

        Ok(config)
    }
}
