use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ghaad::encoding::encode_content;
use ghaad::{Adapter, AdapterError, DirectoryFile};
use ghaad_github::{GitHubAdapter, GitHubAdapterConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter_for(server: &MockServer) -> GitHubAdapter {
    let adapter = GitHubAdapter::new(GitHubAdapterConfig {
        client_id: "Iv1.test".into(),
        redirect_uri: "http://localhost:3000/oauth/github".into(),
        api_base_url: Some(server.uri()),
    });
    adapter.set_token(Some("gho_test".into()));
    adapter.set_owner(Some("octo".into()));
    adapter.set_repo(Some("cfp".into()));
    adapter
}

fn file_json(path: &str, text: &str, sha: &str) -> serde_json::Value {
    let name = path.rsplit('/').next().unwrap_or(path);
    // GitHub wraps base64 at 60 columns
    let encoded = encode_content(text)
        .as_bytes()
        .chunks(60)
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect::<Vec<_>>()
        .join("\n");

    json!({
        "type": "file",
        "name": name,
        "path": path,
        "sha": sha,
        "content": encoded,
        "encoding": "base64"
    })
}

fn entry_json(path: &str, entry_type: &str) -> serde_json::Value {
    json!({
        "type": entry_type,
        "name": path.rsplit('/').next().unwrap_or(path),
        "path": path,
        "sha": "0000"
    })
}

#[tokio::test]
async fn fetch_file_decodes_content() {
    let server = MockServer::start().await;
    let text = r#"{ "id": "talk_1", "title": "A rather long talk title that wraps the encoded payload" }"#;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/collections/talks/talk_1.json"))
        .and(header("authorization", "Bearer gho_test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_json("collections/talks/talk_1.json", text, "abc")),
        )
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let content = adapter
        .fetch_file("collections/talks/talk_1.json")
        .await
        .unwrap();
    assert_eq!(content, text);
}

#[tokio::test]
async fn fetch_file_missing_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/config.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let err = adapter.fetch_file("config.json").await.unwrap_err();
    assert!(matches!(err, AdapterError::NotFound(_)));
}

#[tokio::test]
async fn fetch_file_on_directory_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/collections"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([entry_json("collections/talks", "dir")])),
        )
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    assert!(adapter.fetch_file("collections").await.is_err());
}

#[tokio::test]
async fn unauthorized_runs_handler_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/config.json"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    adapter.set_unauthorized_handler(Some(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })));

    let err = adapter.fetch_file("config.json").await.unwrap_err();
    assert!(matches!(err, AdapterError::Unauthorized));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_error_is_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/config.json"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let err = adapter.fetch_file("config.json").await.unwrap_err();
    match err {
        AdapterError::Http { status, message } => {
            assert_eq!(status, 502);
            assert_eq!(message, "bad gateway");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_repository_fails_without_request() {
    let server = MockServer::start().await;
    let adapter = GitHubAdapter::new(GitHubAdapterConfig {
        api_base_url: Some(server.uri()),
        ..GitHubAdapterConfig::default()
    });

    let err = adapter.fetch_file("config.json").await.unwrap_err();
    assert!(matches!(err, AdapterError::MissingSession("owner")));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_directory_reads_only_json_files() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/collections/talks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            entry_json("collections/talks/.gitkeep", "file"),
            entry_json("collections/talks/talk_1.json", "file"),
            entry_json("collections/talks/notes.md", "file"),
            entry_json("collections/talks/archive.json", "dir"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/collections/talks/talk_1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(
            "collections/talks/talk_1.json",
            r#"{"id":"talk_1"}"#,
            "abc",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let files = adapter.fetch_directory("collections/talks").await.unwrap();
    assert_eq!(
        files,
        vec![DirectoryFile {
            path: "collections/talks/talk_1.json".into(),
            content: r#"{"id":"talk_1"}"#.into(),
        }]
    );
}

#[tokio::test]
async fn fetch_directory_missing_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/collections/talks"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let files = adapter.fetch_directory("collections/talks").await.unwrap();
    assert!(files.is_empty());
}

#[tokio::test]
async fn fetch_repositories_follows_pages() {
    let server = MockServer::start().await;
    let repo = |n: u64| {
        json!({
            "id": n,
            "name": format!("repo-{n}"),
            "html_url": format!("https://github.com/octo/repo-{n}"),
            "owner": { "login": "octo" }
        })
    };

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "100"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json((1..=100).map(repo).collect::<Vec<_>>()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([repo(101)])))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let repos = adapter.fetch_repositories().await.unwrap();
    assert_eq!(repos.len(), 101);
    assert_eq!(repos[0].id, "1");
    assert_eq!(repos[0].org, "octo");
    assert_eq!(repos[100].name, "repo-101");
    assert_eq!(repos[100].url, "https://github.com/octo/repo-101");
}

#[tokio::test]
async fn fetch_repositories_requires_token() {
    let server = MockServer::start().await;
    let adapter = adapter_for(&server);
    adapter.set_token(None);

    let err = adapter.fetch_repositories().await.unwrap_err();
    assert!(matches!(err, AdapterError::MissingSession("token")));
}

#[tokio::test]
async fn file_history_maps_commits() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/commits"))
        .and(query_param("path", "collections/talks/talk_1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "sha": "c2",
                "commit": {
                    "message": "Update Talk talk_1",
                    "author": { "name": "Mona", "date": "2024-05-02T10:00:00Z" },
                    "committer": { "name": "GitHub", "date": "2024-05-02T10:00:01Z" }
                },
                "author": { "login": "mona", "avatar_url": "https://avatars.example/mona" }
            },
            {
                "sha": "c1",
                "commit": {
                    "message": "Create Talk talk_1",
                    "author": { "name": "Unlinked", "date": "2024-05-01T10:00:00Z" },
                    "committer": null
                },
                "author": null
            }
        ])))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let history = adapter
        .fetch_file_history("collections/talks/talk_1.json")
        .await
        .unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].commit_id, "c2");
    assert_eq!(history[0].author_name, "Mona");
    assert_eq!(history[0].date, "2024-05-02T10:00:00Z");
    assert_eq!(
        history[0].author_image_url.as_deref(),
        Some("https://avatars.example/mona")
    );
    assert_eq!(history[1].message, "Create Talk talk_1");
    assert!(history[1].author_image_url.is_none());
}

#[tokio::test]
async fn create_file_puts_encoded_content() {
    let server = MockServer::start().await;
    let text = r#"{"id":"talk_1"}"#;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/collections/talks/talk_1.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/repos/octo/cfp/contents/collections/talks/talk_1.json"))
        .and(body_partial_json(json!({
            "message": "Create Talk talk_1",
            "content": encode_content(text)
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "content": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    adapter
        .create_file("collections/talks/talk_1.json", text, Some("Create Talk talk_1"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|request| request.method.as_str() == "PUT")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
    assert!(body.get("sha").is_none());
}

#[tokio::test]
async fn create_existing_file_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/config.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(file_json("config.json", "{}", "abc")),
        )
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let err = adapter.create_file("config.json", "{}", None).await.unwrap_err();
    assert!(matches!(err, AdapterError::AlreadyExists(_)));
}

#[tokio::test]
async fn update_file_sends_blob_sha() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/config.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(file_json("config.json", "[]", "sha-old")),
        )
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/repos/octo/cfp/contents/config.json"))
        .and(body_partial_json(json!({
            "message": "Update file: config.json",
            "sha": "sha-old",
            "content": encode_content("{}")
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    adapter.update_file("config.json", "{}", None).await.unwrap();
}

#[tokio::test]
async fn update_missing_file_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/config.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let err = adapter.update_file("config.json", "{}", None).await.unwrap_err();
    assert!(matches!(err, AdapterError::NotFound(_)));
}

#[tokio::test]
async fn delete_file_sends_blob_sha() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/octo/cfp/contents/collections/talks/talk_1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(
            "collections/talks/talk_1.json",
            "{}",
            "sha-talk",
        )))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/repos/octo/cfp/contents/collections/talks/talk_1.json"))
        .and(body_partial_json(json!({
            "message": "Delete Talk talk_1",
            "sha": "sha-talk"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "commit": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    adapter
        .delete_file("collections/talks/talk_1.json", Some("Delete Talk talk_1"))
        .await
        .unwrap();
}
