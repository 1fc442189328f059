use std::path::PathBuf;

use anyhow::Result;
use kube::{
    config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
    Client, Config,
};

use crate::logger;

use super::KubeClient;

/// クラスタ接続の設定
#[derive(Debug, Default, Clone)]
pub struct ConnectionConfig {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
}

fn read_kubeconfig(path: PathBuf) -> Result<Kubeconfig, KubeconfigError> {
    Kubeconfig::read_from(path)
}

fn kubeconfig_options(context: Option<String>) -> KubeConfigOptions {
    KubeConfigOptions {
        context,
        ..Default::default()
    }
}

/// Resolves the kube config. Without an explicit path the usual inference
/// applies ($KUBECONFIG, ~/.kube/config, then in-cluster service account).
async fn build_config(config: ConnectionConfig) -> Result<Config> {
    let ConnectionConfig {
        kubeconfig,
        context,
    } = config;

    let config = match (kubeconfig, context) {
        (Some(path), context) => {
            let kubeconfig = read_kubeconfig(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &kubeconfig_options(context)).await?
        }
        (None, Some(context)) => {
            Config::from_kubeconfig(&kubeconfig_options(Some(context))).await?
        }
        (None, None) => Config::infer().await?,
    };

    Ok(config)
}

pub async fn connect(config: ConnectionConfig) -> Result<KubeClient> {
    let config = build_config(config).await?;

    logger!(info, "Connecting to {}", config.cluster_url);

    let client = Client::try_from(config)?;

    Ok(KubeClient::new(client))
}
