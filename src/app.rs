use anyhow::Result;
use tokio::runtime::Runtime;

use crate::{
    cmd::Command,
    config::Config,
    dump::Dumper,
    kube::connect,
    logger,
};

pub struct App;

impl App {
    pub fn run(cmd: Command, config: Config) -> Result<()> {
        logger!(
            info,
            "{} version: {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );

        logger!(
            info,
            "stateless table version: {}",
            config.stateless.version
        );

        let dump_config = cmd.dump_config(config.stateless);

        let rt = Runtime::new()?;

        let summary = rt.block_on(async {
            let client = connect(cmd.connection_config()).await?;

            let dumper = Dumper::new(client, dump_config)?;

            anyhow::Ok(dumper.run().await?)
        })?;

        if 0 < cmd.verbosity {
            println!("{}", summary);
        }

        Ok(())
    }
}
