use crate::app::image_acquirer::ImageSource;
use crate::app::ports::{FilePart, HttpClientPort, HttpRequest, Method, MultipartBody, RequestBody};
use crate::error::{BotError, Result};
use crate::graphql::{api_endpoint, decode, operations::UPLOAD_MEDIA};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

const FILE_FIELD: &str = "image1";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadData {
    upload_media: UploadedMedia,
}

#[derive(Deserialize)]
struct UploadedMedia {
    #[serde(default)]
    uuid: Option<String>,
}

/// Uploads pictures through the GraphQL multipart request format.
pub struct MediaUploader {
    http: Arc<dyn HttpClientPort>,
    endpoint: String,
}

impl MediaUploader {
    pub fn new(http: Arc<dyn HttpClientPort>, base_url: &str) -> Self {
        Self {
            http,
            endpoint: api_endpoint(base_url),
        }
    }

    pub async fn upload(&self, image: &ImageSource) -> Result<Uuid> {
        let (file_name, bytes) = match image {
            ImageSource::File(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| BotError::MissingField(format!("file name of {}", path.display())))?;
                (name, tokio::fs::read(path).await?)
            }
            ImageSource::DataUri(uri) => decode_data_uri(uri)?,
        };
        debug!(%file_name, bytes = bytes.len(), "uploading media");

        let body = MultipartBody {
            fields: vec![
                ("query".into(), UPLOAD_MEDIA.into()),
                (
                    "variables".into(),
                    json!({ "name": file_name, "file": FILE_FIELD }).to_string(),
                ),
            ],
            file: FilePart {
                field: FILE_FIELD.into(),
                file_name: file_name.clone(),
                bytes,
            },
        };
        let request = HttpRequest::new(Method::Post, &self.endpoint).with_body(RequestBody::Multipart(body));
        let resp = self.http.execute(request).await?;
        if !resp.is_success() {
            error!(%file_name, status = resp.status, "Error uploading image");
            return Err(BotError::Status {
                status: resp.status,
                url: self.endpoint.clone(),
            });
        }

        let data: UploadData = decode(&resp.bytes)?;
        let uuid = data.upload_media.uuid.unwrap_or_default();
        if uuid.is_empty() {
            return Err(BotError::MissingField(format!(
                "media uuid in upload response for {file_name}"
            )));
        }
        let uuid = Uuid::parse_str(&uuid)
            .map_err(|e| BotError::GraphQl(format!("invalid media uuid {uuid}: {e}")))?;
        info!(%file_name, %uuid, "media uploaded");
        Ok(uuid)
    }
}

/// Split a base64 `data:` URI into an upload name and its decoded bytes.
fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| BotError::UnsupportedImage("not a data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| BotError::UnsupportedImage("data URI without payload".into()))?;
    let mut parts = meta.split(';');
    let mime = parts.next().unwrap_or_default();
    if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(BotError::UnsupportedImage(format!("{mime} data URI is not base64")));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| BotError::UnsupportedImage(format!("bad base64 payload: {e}")))?;
    let ext = match mime.rsplit('/').next().unwrap_or_default() {
        "jpeg" | "pjpeg" => "jpg",
        "" => "img",
        other => other,
    };
    Ok((format!("image.{ext}"), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpResponse;
    use crate::infra::in_memory_http::InMemoryHttp;
    use std::io::Write;

    const API: &str = "https://m.example/api";

    fn multipart(http: &InMemoryHttp) -> MultipartBody {
        match &http.requests()[0].body {
            RequestBody::Multipart(body) => body.clone(),
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_file_builds_graphql_multipart() {
        let uuid = Uuid::new_v4();
        let http = Arc::new(InMemoryHttp::new());
        http.on(
            Method::Post,
            API,
            vec![HttpResponse::json(200, json!({"data": {"uploadMedia": {"uuid": uuid}}}))],
        );
        let mut file = tempfile::Builder::new().prefix("cc2mob.").tempfile().unwrap();
        file.write_all(b"jpeg-bytes").unwrap();
        let name = file.path().file_name().unwrap().to_string_lossy().into_owned();

        let uploaded = MediaUploader::new(http.clone(), "https://m.example")
            .upload(&ImageSource::File(file.path().to_path_buf()))
            .await
            .unwrap();

        assert_eq!(uploaded, uuid);
        let body = multipart(&http);
        assert_eq!(body.fields[0], ("query".to_string(), UPLOAD_MEDIA.to_string()));
        let variables: serde_json::Value = serde_json::from_str(&body.fields[1].1).unwrap();
        assert_eq!(variables, json!({"name": name, "file": "image1"}));
        assert_eq!(body.file.field, "image1");
        assert_eq!(body.file.file_name, name);
        assert_eq!(body.file.bytes, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_upload_data_uri_decodes_payload() {
        let http = Arc::new(InMemoryHttp::new());
        http.on(
            Method::Post,
            API,
            vec![HttpResponse::json(200, json!({"data": {"uploadMedia": {"uuid": Uuid::new_v4()}}}))],
        );

        MediaUploader::new(http.clone(), "https://m.example")
            .upload(&ImageSource::DataUri("data:image/png;base64,aGVsbG8=".into()))
            .await
            .unwrap();

        let body = multipart(&http);
        assert_eq!(body.file.file_name, "image.png");
        assert_eq!(body.file.bytes, b"hello");
    }

    #[tokio::test]
    async fn test_empty_uuid_is_an_error() {
        let http = Arc::new(InMemoryHttp::new());
        http.on(
            Method::Post,
            API,
            vec![HttpResponse::json(200, json!({"data": {"uploadMedia": {"uuid": ""}}}))],
        );
        let err = MediaUploader::new(http, "https://m.example")
            .upload(&ImageSource::DataUri("data:image/jpeg;base64,aGk=".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::MissingField(_)));
    }

    #[test]
    fn test_data_uri_variants() {
        assert_eq!(decode_data_uri("data:image/jpeg;base64,aGk=").unwrap().0, "image.jpg");
        assert!(decode_data_uri("data:image/svg+xml;utf8,<svg/>").is_err());
        assert!(decode_data_uri("https://ex.com/a.png").is_err());
    }
}
