use futures::StreamExt;
use keel_core::{BuildRecord, Index, RackConfig};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::rack::{
    AppInfo, BuildOptions, BuildSource, LogSink, Progress, ProgressFn, RackApi, RackError,
    SystemInfo,
};

/// Upload bodies are handed to the transport in chunks of this size.
const UPLOAD_CHUNK: usize = 64 * 1024;

const AUTH_USER: &str = "keel";

/// [`RackApi`] over HTTPS with basic auth.
pub struct HttpRack {
    client: reqwest::Client,
    base_url: String,
    password: Option<String>,
}

impl HttpRack {
    pub fn new(config: &RackConfig, password: Option<String>) -> Result<Self, RackError> {
        let base_url = config.base_url();
        let client = reqwest::Client::builder()
            .user_agent(concat!("keel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RackError::Endpoint {
                url: base_url.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url,
            password,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.password {
            Some(password) => builder.basic_auth(AUTH_USER, Some(password)),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Response, RackError> {
        let response = builder.send().await.map_err(|e| RackError::Request {
            path: path.to_owned(),
            source: e,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.text().await {
            Ok(body) => body.trim().to_owned(),
            Err(e) => format!("(unreadable body: {e})"),
        };
        Err(RackError::Status {
            path: path.to_owned(),
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<T, RackError> {
        self.send(builder, path)
            .await?
            .json()
            .await
            .map_err(|e| RackError::Decode {
                path: path.to_owned(),
                source: e,
            })
    }
}

/// Stream `data` as a request body, reporting progress per chunk.
///
/// An empty body reports `0 / 0` once so callers still see completion.
fn progress_body(data: Vec<u8>, progress: ProgressFn) -> reqwest::Body {
    let total = data.len() as u64;
    if data.is_empty() {
        progress(Progress { sent: 0, total });
        return reqwest::Body::from(data);
    }

    let chunks: Vec<Vec<u8>> = data.chunks(UPLOAD_CHUNK).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;

    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(Progress { sent, total });
        Ok::<_, std::io::Error>(chunk)
    }));

    reqwest::Body::wrap_stream(stream)
}

impl RackApi for HttpRack {
    async fn get_system(&self) -> Result<SystemInfo, RackError> {
        let path = "/system";
        self.send_json(self.request(Method::GET, path), path).await
    }

    async fn get_app(&self, app: &str) -> Result<AppInfo, RackError> {
        let path = format!("/apps/{app}");
        self.send_json(self.request(Method::GET, &path), &path)
            .await
    }

    async fn index_missing(&self, index: &Index) -> Result<Vec<String>, RackError> {
        let path = "/index/diff";
        let builder = self.request(Method::POST, path).json(index.wire());
        self.send_json(builder, path).await
    }

    async fn index_update(&self, archive: Vec<u8>, progress: ProgressFn) -> Result<(), RackError> {
        let path = "/index/update";
        let builder = self
            .request(Method::POST, path)
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .body(progress_body(archive, progress));
        self.send(builder, path).await?;
        Ok(())
    }

    async fn create_build(
        &self,
        app: &str,
        source: BuildSource<'_>,
        options: &BuildOptions,
        progress: ProgressFn,
    ) -> Result<BuildRecord, RackError> {
        let path = format!("/apps/{app}/builds");
        debug!(app, source = source.kind(), "submitting build");

        let builder = self
            .request(Method::POST, &path)
            .query(&[
                ("cache", options.cache.to_string()),
                ("manifest", options.manifest.clone()),
                ("description", options.description.clone()),
            ]);

        let builder = match source {
            BuildSource::Url(url) => builder.json(&json!({ "url": url })),
            BuildSource::Index(index) => builder.json(&json!({ "index": index.wire() })),
            BuildSource::Tarball(data) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/gzip")
                .body(progress_body(data, progress)),
        };

        self.send_json(builder, &path).await
    }

    async fn get_build(&self, app: &str, id: &str) -> Result<BuildRecord, RackError> {
        let path = format!("/apps/{app}/builds/{id}");
        self.send_json(self.request(Method::GET, &path), &path)
            .await
    }

    async fn list_builds(&self, app: &str) -> Result<Vec<BuildRecord>, RackError> {
        let path = format!("/apps/{app}/builds");
        self.send_json(self.request(Method::GET, &path), &path)
            .await
    }

    async fn copy_build(
        &self,
        app: &str,
        id: &str,
        dest_app: &str,
    ) -> Result<BuildRecord, RackError> {
        let path = format!("/apps/{app}/builds/{id}/copy");
        let builder = self
            .request(Method::POST, &path)
            .json(&json!({ "app": dest_app }));
        self.send_json(builder, &path).await
    }

    async fn delete_build(&self, app: &str, id: &str) -> Result<BuildRecord, RackError> {
        let path = format!("/apps/{app}/builds/{id}");
        self.send_json(self.request(Method::DELETE, &path), &path)
            .await
    }

    async fn stream_build_logs(
        &self,
        app: &str,
        id: &str,
        sink: LogSink<'_>,
    ) -> Result<(), RackError> {
        let path = format!("/apps/{app}/builds/{id}/logs");
        let response = self.send(self.request(Method::GET, &path), &path).await?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RackError::Request {
                path: path.clone(),
                source: e,
            })?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| RackError::Sink { source: e })?;
            sink.flush().await.map_err(|e| RackError::Sink { source: e })?;
        }

        Ok(())
    }
}
