//! Document conversion client
//!
//! Four-step iLovePDF flow: authenticate, start a task for a tool, upload
//! the file to the assigned server, process, then download the result.

use super::backend::{BackendError, ConvertedFile, DocumentConverter};
use crate::chat::models::Attachment;
use crate::config::ConversionConfig;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::multipart;
use serde::{Deserialize, Serialize};

/// Conversion tool chosen from the input MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionTool {
    /// Image to PDF
    ImagePdf,
    /// Word/Excel/PowerPoint to PDF
    OfficePdf,
    /// HTML page to PDF
    HtmlPdf,
    /// PDF pages to JPG
    PdfJpg,
}

impl ConversionTool {
    /// Tool for a MIME type, `None` when nothing handles it
    pub fn for_mime_type(mime_type: &str) -> Option<Self> {
        let mime = mime_type.to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(Self::ImagePdf)
        } else if mime == "application/pdf" {
            Some(Self::PdfJpg)
        } else if mime == "text/html" {
            Some(Self::HtmlPdf)
        } else if mime == "application/msword"
            || mime == "application/vnd.ms-excel"
            || mime == "application/vnd.ms-powerpoint"
            || mime.starts_with("application/vnd.openxmlformats-officedocument.")
            || mime.starts_with("application/vnd.oasis.opendocument.")
        {
            Some(Self::OfficePdf)
        } else {
            None
        }
    }

    /// Tool name in API paths and bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImagePdf => "imagepdf",
            Self::OfficePdf => "officepdf",
            Self::HtmlPdf => "htmlpdf",
            Self::PdfJpg => "pdfjpg",
        }
    }

    /// Name and MIME type of the output for `input_name`
    fn output(&self, input_name: &str) -> (String, &'static str) {
        let stem = file_stem(input_name);
        match self {
            // pdfjpg returns an archive of page images
            Self::PdfJpg => (format!("{}.zip", stem), "application/zip"),
            _ => (format!("{}.pdf", stem), "application/pdf"),
        }
    }
}

/// File name without its last extension
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(pos) => &name[..pos],
    }
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    public_key: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Deserialize)]
struct StartResponse {
    server: String,
    task: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    server_filename: String,
}

#[derive(Serialize)]
struct ProcessRequest<'a> {
    task: &'a str,
    tool: &'a str,
    files: Vec<ProcessFile<'a>>,
}

#[derive(Serialize)]
struct ProcessFile<'a> {
    server_filename: &'a str,
    filename: &'a str,
}

/// iLovePDF conversion client
pub struct IlovePdfClient {
    http: reqwest::Client,
    public_key: String,
    api_base_url: String,
}

impl IlovePdfClient {
    /// Create a client; `None` when no public key is configured
    pub fn from_config(http: reqwest::Client, config: &ConversionConfig) -> Option<Self> {
        let public_key = config.public_key.clone()?;
        Some(Self {
            http,
            public_key,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn authenticate(&self) -> Result<String, BackendError> {
        let response = self
            .http
            .post(format!("{}/auth", self.api_base_url))
            .json(&AuthRequest {
                public_key: &self.public_key,
            })
            .send()
            .await?;
        let auth: AuthResponse = check_status(response).await?.json().await?;
        Ok(auth.token)
    }

    async fn start(&self, token: &str, tool: ConversionTool) -> Result<StartResponse, BackendError> {
        let response = self
            .http
            .get(format!("{}/start/{}", self.api_base_url, tool.as_str()))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

/// Base URL of a task server; bare host names are served over HTTPS
fn server_base(server: &str) -> String {
    if server.contains("://") {
        server.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", server.trim_end_matches('/'))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let status_code = status.as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    tracing::warn!(status_code, error_body = %body, "Conversion API returned error status");

    if status_code == 401 || status_code == 403 {
        return Err(BackendError::Auth(format!("HTTP {}: {}", status_code, body)));
    }
    Err(BackendError::Status {
        status: status_code,
        body,
    })
}

#[async_trait]
impl DocumentConverter for IlovePdfClient {
    async fn convert(&self, file: &Attachment) -> Result<ConvertedFile, BackendError> {
        let tool = ConversionTool::for_mime_type(&file.mime_type).ok_or_else(|| {
            BackendError::Unsupported(format!("no conversion tool for {}", file.mime_type))
        })?;
        let bytes = BASE64.decode(&file.data)?;

        tracing::info!(file = %file.name, tool = tool.as_str(), "Starting conversion");

        let token = self.authenticate().await?;
        let task = self.start(&token, tool).await?;
        let base = server_base(&task.server);

        let part = multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let form = multipart::Form::new()
            .text("task", task.task.clone())
            .part("file", part);
        let response = self
            .http
            .post(format!("{}/v1/upload", base))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await?;
        let upload: UploadResponse = check_status(response).await?.json().await?;

        let response = self
            .http
            .post(format!("{}/v1/process", base))
            .bearer_auth(&token)
            .json(&ProcessRequest {
                task: &task.task,
                tool: tool.as_str(),
                files: vec![ProcessFile {
                    server_filename: &upload.server_filename,
                    filename: &file.name,
                }],
            })
            .send()
            .await?;
        check_status(response).await?;

        let response = self
            .http
            .get(format!("{}/v1/download/{}", base, task.task))
            .bearer_auth(&token)
            .send()
            .await?;
        let data = check_status(response).await?.bytes().await?.to_vec();

        let (file_name, mime_type) = tool.output(&file.name);
        tracing::info!(file = %file.name, output = %file_name, bytes = data.len(), "Conversion finished");

        Ok(ConvertedFile {
            file_name,
            mime_type: mime_type.to_string(),
            data,
        })
    }
}
