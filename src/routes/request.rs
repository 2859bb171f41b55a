use std::path::Path;

use indexmap::IndexMap;
use reqwest::{
    Client, Method, RequestBuilder,
    multipart::{Form, Part},
};
use serde_json::Value;

use crate::error::ApiError;

/// Binary file sent as one part of a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Name sent in the part's `Content-Disposition`.
    pub file_name: String,
    /// Part content type.
    pub mime: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Attachment from in-memory bytes.
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a staged file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &str) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ApiError::Attachment {
                path: path.to_string(),
                source,
            })?;
        let file_name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());
        let mime = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();
        Ok(Self::new(file_name, mime, bytes))
    }

    /// Read `path` when one is staged; blank paths mean no attachment.
    pub async fn optional(path: &str) -> Result<Option<Self>, ApiError> {
        if path.trim().is_empty() {
            Ok(None)
        } else {
            Self::from_path(path).await.map(Some)
        }
    }

    fn into_part(self) -> Result<Part, ApiError> {
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime)
            .map_err(|source| ApiError::AttachmentType {
                mime: self.mime.clone(),
                source,
            })
    }
}

/// Request payload shapes accepted by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No body.
    Empty,
    /// JSON document.
    Json(Value),
    /// Text fields plus up to two binary attachments.
    Multipart {
        /// Text fields in insertion order.
        fields: IndexMap<String, String>,
        /// Image part.
        image: Option<Attachment>,
        /// 3D model part.
        model: Option<Attachment>,
    },
}

/// One backend call: method, path relative to the server URL, and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the server URL.
    pub path: String,
    /// Payload.
    pub body: Body,
}

impl ApiRequest {
    /// Body-less `GET`.
    pub fn get(path: String) -> Self {
        Self {
            method: Method::GET,
            path,
            body: Body::Empty,
        }
    }

    /// `POST` with a JSON body.
    pub fn post_json(path: String, payload: Value) -> Self {
        Self {
            method: Method::POST,
            path,
            body: Body::Json(payload),
        }
    }

    /// `POST` as `multipart/form-data`.
    pub fn post_form(
        path: String,
        fields: IndexMap<String, String>,
        image: Option<Attachment>,
        model: Option<Attachment>,
    ) -> Self {
        Self {
            method: Method::POST,
            path,
            body: Body::Multipart {
                fields,
                image,
                model,
            },
        }
    }

    /// Absolute URL for `base_url`.
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Turn the description into a ready-to-send request.
    pub fn build(self, client: &Client, base_url: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.url(base_url);
        let builder = client
            .request(self.method, url)
            .header(reqwest::header::ACCEPT, "application/json");

        match self.body {
            Body::Empty => Ok(builder),
            Body::Json(payload) => Ok(builder.json(&payload)),
            Body::Multipart {
                fields,
                image,
                model,
            } => {
                let mut form = fields
                    .into_iter()
                    .fold(Form::new(), |form, (key, value)| form.text(key, value));
                if let Some(image) = image {
                    form = form.part("image", image.into_part()?);
                }
                if let Some(model) = model {
                    form = form.part("model", model.into_part()?);
                }
                Ok(builder.multipart(form))
            }
        }
    }
}
