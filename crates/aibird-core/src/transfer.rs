//! HTTP file transfer: fetch a generated image, push it to a file host.

use std::{path::Path, time::Duration};

use async_trait::async_trait;

use crate::{errors::Error, ports::FileTransfer, Result};

#[derive(Clone, Debug)]
pub struct HttpFileTransfer {
    http: reqwest::Client,
}

impl HttpFileTransfer {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl FileTransfer for HttpFileTransfer {
    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::External(format!("download request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::External(format!(
                "download failed: {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::External(format!("download read error: {e}")))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    async fn upload(&self, base_url: &str, file: &Path) -> Result<String> {
        let file_name = upload_file_name(file)?;
        let bytes = tokio::fs::read(file).await?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| Error::External(format!("upload multipart error: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(base_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::External(format!("upload request error: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::External(format!(
                "upload failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let public_ref = body.trim();
        if public_ref.is_empty() {
            return Err(Error::External(
                "upload returned an empty reference".to_string(),
            ));
        }
        Ok(public_ref.to_string())
    }
}

fn upload_file_name(file: &Path) -> Result<String> {
    file.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidPath {
            path: file.to_path_buf(),
            reason: "no file name".to_string(),
        })
}
