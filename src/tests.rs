//! Integration tests for the LinkBio backend.

use std::sync::Arc;

use reqwest::{redirect, Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::Repository;
use crate::store::{init_store, Store};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(None).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_store(&db_path).await.expect("Failed to init store");
        let repo = Arc::new(Repository::new(Store::new(pool), 100, 3));

        let config = Config {
            api_psk: psk,
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            list_limit: 100,
            txn_retries: 3,
        };

        let state = AppState {
            repo,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        // Redirects are asserted on, never followed
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .unwrap();

        TestFixture {
            client,
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_profile(&self, name: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/api/profiles"))
            .form(&[("name", name)])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.unwrap()
    }

    async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }
}

fn link_ids(links: &Value) -> Vec<u64> {
    links
        .as_array()
        .unwrap()
        .iter()
        .map(|link| link["id"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_create_profile_bootstraps_sample_links() {
    let fixture = TestFixture::new().await;

    let body = fixture.create_profile("New Profile").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["profile"]["slug"], "new-profile");
    assert_eq!(body["data"]["profile"]["fullName"], "New Profile");
    assert_eq!(body["data"]["profile"]["viewCount"], 0);
    assert_eq!(body["data"]["messages"][0], "Created profile: New Profile!");

    let (status, page) = fixture.get_json("/api/profiles/new-profile/edit").await;
    assert_eq!(status, 200);
    assert_eq!(page["data"]["profile"]["slug"], "new-profile");
    assert_eq!(page["data"]["emojiOptions"].as_array().unwrap().len(), 10);

    let links = page["data"]["links"].as_array().unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0]["order"], 1);
    assert_eq!(links[0]["title"], "StatelyDB Docs");
    assert_eq!(links[1]["order"], 2);
    assert_eq!(links[1]["url"], "mailto:support@stately.cloud");
}

#[tokio::test]
async fn test_accented_name_gets_ascii_slug() {
    let fixture = TestFixture::new().await;

    let body = fixture.create_profile("Zoë Smith").await;
    assert_eq!(body["data"]["profile"]["slug"], "zoe-smith");
    assert_eq!(body["data"]["profile"]["fullName"], "Zoë Smith");

    let (status, _) = fixture.get_json("/api/profiles/zoe-smith").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_create_profile_validation_and_conflict() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles"))
        .form(&[("name", "   ")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles"))
        .form(&[("name", "!!!")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    fixture.create_profile("Ada Lovelace").await;
    let resp = fixture
        .client
        .post(fixture.url("/api/profiles"))
        .form(&[("name", "ada lovelace")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_list_profiles() {
    let fixture = TestFixture::new().await;

    let (_, empty) = fixture.get_json("/api/profiles").await;
    assert!(empty["data"].as_array().unwrap().is_empty());

    fixture.create_profile("Bob").await;
    fixture.create_profile("Ada").await;

    let (status, body) = fixture.get_json("/api/profiles").await;
    assert_eq!(status, 200);
    let slugs: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, vec!["ada", "bob"]);
}

#[tokio::test]
async fn test_profile_detail_counts_views() {
    let fixture = TestFixture::new().await;
    fixture.create_profile("Ada").await;

    let (status, first) = fixture.get_json("/api/profiles/ada").await;
    assert_eq!(status, 200);
    assert_eq!(first["data"]["profile"]["viewCount"], 1);
    assert_eq!(first["data"]["links"].as_array().unwrap().len(), 2);
    assert_eq!(first["data"]["totalClicks"], 0);

    let (_, second) = fixture.get_json("/api/profiles/ada").await;
    assert_eq!(second["data"]["profile"]["viewCount"], 2);

    // The edit page does not count as a view
    let (_, edit) = fixture.get_json("/api/profiles/ada/edit").await;
    assert_eq!(edit["data"]["profile"]["viewCount"], 2);
}

#[tokio::test]
async fn test_not_found_errors() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/profiles/nobody").await;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture.get_json("/api/profiles/nobody/edit").await;
    assert_eq!(status, 404);

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/nobody/edit"))
        .form(&[("profile_name", "Somebody")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/nobody/links"))
        .form(&[
            ("title", "Blog"),
            ("url", "blog.example"),
            ("description", "Posts"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .get(fixture.url("/nobody/link/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_edit_profile() {
    let fixture = TestFixture::new().await;
    fixture.create_profile("Ada").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/edit"))
        .form(&[("profile_name", " Countess "), ("profile_bio", "Analyst")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["profile"]["fullName"], "Countess");
    assert_eq!(body["data"]["profile"]["bio"], "Analyst");
    assert_eq!(body["data"]["profile"]["slug"], "ada");
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 2);

    // Unchanged values and an empty name write nothing
    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/edit"))
        .form(&[("profile_name", ""), ("profile_bio", "Analyst")])
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["profile"]["fullName"], "Countess");
    assert!(body["data"].get("messages").is_none());

    // An empty bio clears it
    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/edit"))
        .form(&[("profile_bio", "")])
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["profile"]["bio"], "");
}

#[tokio::test]
async fn test_add_and_delete_links() {
    let fixture = TestFixture::new().await;
    fixture.create_profile("Ada").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/links"))
        .form(&[("title", "Blog"), ("url", "blog.example")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/links"))
        .form(&[
            ("title", "Blog"),
            ("url", "blog.example"),
            ("description", "Posts"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let link = &body["data"];
    assert_eq!(link["url"], "https://blog.example");
    assert_eq!(link["emoji"], "🔗");
    assert_eq!(link["linkType"], "other");
    assert_eq!(link["order"], 3);
    assert_eq!(link["clickCount"], 0);
    assert_eq!(link["isActive"], true);
    let id = link["id"].as_u64().unwrap();

    let delete_url = fixture.url(&format!("/api/profiles/ada/links/{}/delete", id));
    let resp = fixture.client.post(&delete_url).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture.client.post(&delete_url).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let (_, page) = fixture.get_json("/api/profiles/ada").await;
    assert_eq!(link_ids(&page["data"]["links"]), vec![1, 2]);
}

#[tokio::test]
async fn test_reorder_links() {
    let fixture = TestFixture::new().await;
    fixture.create_profile("Ada").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/order"))
        .json(&json!({
            "orders": [
                { "id": 2, "order": 1 },
                { "id": 1, "order": 2 },
                { "id": 99, "order": 3 }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["updated"], json!([2, 1]));
    assert_eq!(body["data"]["missing"], json!([99]));

    let (_, page) = fixture.get_json("/api/profiles/ada").await;
    assert_eq!(link_ids(&page["data"]["links"]), vec![2, 1]);
}

#[tokio::test]
async fn test_add_link_after_highest_ordinal_conflicts() {
    let fixture = TestFixture::new().await;
    fixture.create_profile("Ada").await;

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/order"))
        .json(&json!({ "orders": [{ "id": 2, "order": u32::MAX }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/links"))
        .form(&[
            ("title", "Blog"),
            ("url", "blog.example"),
            ("description", "Posts"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, page) = fixture.get_json("/api/profiles/ada/edit").await;
    assert_eq!(link_ids(&page["data"]["links"]), vec![1, 2]);
}

#[tokio::test]
async fn test_link_redirect_counts_clicks() {
    let fixture = TestFixture::new().await;
    fixture.create_profile("Ada").await;

    let resp = fixture
        .client
        .get(fixture.url("/ada/link/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers()["location"],
        "https://docs.stately.cloud/api/put/"
    );

    let resp = fixture
        .client
        .get(fixture.url("/ada/link/2"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()["location"], "mailto:support@stately.cloud");

    let (_, page) = fixture.get_json("/api/profiles/ada").await;
    let links = page["data"]["links"].as_array().unwrap();
    assert_eq!(links[0]["clickCount"], 1);
    assert_eq!(links[1]["clickCount"], 1);
    assert_eq!(page["data"]["totalClicks"], 2);

    let resp = fixture
        .client
        .get(fixture.url("/ada/link/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clicks_are_all_counted() {
    let fixture = TestFixture::new().await;
    fixture.create_profile("Ada").await;

    let requests = (0..10).map(|_| fixture.client.get(fixture.url("/ada/link/1")).send());
    for resp in futures::future::join_all(requests).await {
        assert_eq!(resp.unwrap().status(), StatusCode::FOUND);
    }

    let (_, page) = fixture.get_json("/api/profiles/ada/edit").await;
    assert_eq!(page["data"]["links"][0]["id"], 1);
    assert_eq!(page["data"]["links"][0]["clickCount"], 10);
}

#[tokio::test]
async fn test_writes_require_psk_when_configured() {
    let fixture = TestFixture::with_psk(Some("secret-key".to_string())).await;

    // Writes without a key are rejected
    let resp = fixture
        .client
        .post(fixture.url("/api/profiles"))
        .form(&[("name", "Ada")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles"))
        .header("x-api-key", "wrong-key")
        .form(&[("name", "Ada")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles"))
        .header("x-api-key", "secret-key")
        .form(&[("name", "Ada")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .post(fixture.url("/api/profiles/ada/edit"))
        .bearer_auth("secret-key")
        .form(&[("profile_bio", "Analyst")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Reads and redirects stay public
    let (status, _) = fixture.get_json("/api/profiles/ada").await;
    assert_eq!(status, 200);

    let resp = fixture
        .client
        .get(fixture.url("/ada/link/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
}
