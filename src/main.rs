mod app;
mod cmd;
mod config;
mod dump;
mod error;
mod kube;
mod logging;

use anyhow::Result;

use app::App;
use cmd::Command;
use config::Config;
use logging::Logger;

fn main() -> Result<()> {
    let cmd = Command::init();

    Logger::init(&cmd.logger_config())?;

    let config = Config::load(cmd.config_load_option()?)?;

    App::run(cmd, config)
}
