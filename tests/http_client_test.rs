use anyhow::Result;
use mobilizon_bot::app::ports::{FilePart, HttpClientPort, HttpRequest, Method, MultipartBody, RequestBody};
use mobilizon_bot::infra::http_client::ReqwestHttp;
use mockito::Matcher;
use serde_json::json;

#[tokio::test]
async fn test_get_reports_status_type_and_length() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/poster.png")
        .match_header("user-agent", "test-agent")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(vec![1u8, 2, 3, 4])
        .create_async()
        .await;

    let http = ReqwestHttp::new();
    let resp = http
        .execute(HttpRequest::get(format!("{}/poster.png", server.url())).with_header("User-Agent", "test-agent"))
        .await?;

    mock.assert_async().await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.mime(), "image/png");
    assert_eq!(resp.content_length, Some(4));
    assert_eq!(resp.bytes, vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_error_statuses_are_responses_not_errors() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    server.mock("POST", "/api").with_status(503).create_async().await;

    let resp = ReqwestHttp::new()
        .execute(HttpRequest::post_json(format!("{}/api", server.url()), json!({"query": "{}"})))
        .await?;

    assert_eq!(resp.status, 503);
    assert!(!resp.is_success());
    Ok(())
}

#[tokio::test]
async fn test_json_and_form_bodies_are_encoded() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let json_mock = server
        .mock("POST", "/api")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"query": "q", "variables": {"a": 1}})))
        .with_status(200)
        .with_body(r#"{"data": {}}"#)
        .create_async()
        .await;
    let form_mock = server
        .mock("POST", "/oauth/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("client_id".into(), "abc".into()),
            Matcher::UrlEncoded("grant_type".into(), "device".into()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let http = ReqwestHttp::new();
    http.execute(HttpRequest::post_json(
        format!("{}/api", server.url()),
        json!({"query": "q", "variables": {"a": 1}}),
    ))
    .await?;
    http.execute(HttpRequest::post_form(
        format!("{}/oauth/token", server.url()),
        vec![("client_id".into(), "abc".into()), ("grant_type".into(), "device".into())],
    ))
    .await?;

    json_mock.assert_async().await;
    form_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_multipart_upload_carries_fields_and_file() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api")
        .match_header("content-type", Matcher::Regex("^multipart/form-data; boundary=".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="query""#.into()),
            Matcher::Regex("uploadMedia".into()),
            Matcher::Regex(r#"name="image1"; filename="poster.jpg""#.into()),
            Matcher::Regex("fake-jpeg-bytes".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"data": {"uploadMedia": {"uuid": "x"}}}"#)
        .create_async()
        .await;

    let body = MultipartBody {
        fields: vec![
            ("query".into(), "mutation uploadMedia { x }".into()),
            ("variables".into(), json!({"name": "poster.jpg", "file": "image1"}).to_string()),
        ],
        file: FilePart {
            field: "image1".into(),
            file_name: "poster.jpg".into(),
            bytes: b"fake-jpeg-bytes".to_vec(),
        },
    };
    let resp = ReqwestHttp::new()
        .execute(HttpRequest::new(Method::Post, format!("{}/api", server.url())).with_body(RequestBody::Multipart(body)))
        .await?;

    mock.assert_async().await;
    assert!(resp.text().contains("uploadMedia"));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_host_is_a_transport_error() {
    let err = ReqwestHttp::new()
        .execute(HttpRequest::get("http://127.0.0.1:1/nothing"))
        .await
        .unwrap_err();
    assert!(matches!(err, mobilizon_bot::error::BotError::Transport(_)));
}
