use anyhow::Result;
use async_trait::async_trait;
use http::header::{HeaderValue, ACCEPT};
use kube::{
    api::{GetParams, Request},
    Client,
};
use serde::de::DeserializeOwned;

use crate::logger;

fn remove_slash(path: &str) -> &str {
    if let Some(path) = path.strip_prefix('/') {
        path
    } else {
        path
    }
}

#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn inner_request<T>(&self, path: &str, header: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let request = Request::new("");

        let mut request = request.get(remove_slash(path), &GetParams::default())?;

        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_str(header)?);

        logger!(debug, "HTTP request {:?}", request);

        let ret = self.client.request(request).await;

        ret.map_err(Into::into)
    }
}

#[async_trait]
pub trait KubeClientRequest: Send + Sync {
    async fn request<T: DeserializeOwned + Send + 'static>(&self, path: &str) -> Result<T>;
}

#[async_trait]
impl KubeClientRequest for KubeClient {
    async fn request<T: DeserializeOwned + Send + 'static>(&self, path: &str) -> Result<T> {
        self.inner_request(path, "application/json").await
    }
}
