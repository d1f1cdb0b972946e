use chrono::{Duration, Utc};
use disaster_portal::{api::routes::create_router, config::Config, AppState};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestApp {
    base_url: String,
    news_file: PathBuf,
    _dir: TempDir,
}

/// Starts the router on an ephemeral port against the given mock datastore.
async fn spawn_app(datastore: &ServerGuard, news: Option<Value>) -> TestApp {
    spawn_app_with(datastore.url(), news, &[]).await
}

async fn spawn_app_with(url: String, news: Option<Value>, env: &[(&str, &str)]) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = dir.path().join("public");
    std::fs::create_dir(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<h1>Disaster Portal</h1>").unwrap();

    let news_file = static_dir.join("news.json");
    if let Some(news) = news {
        std::fs::write(&news_file, news.to_string()).unwrap();
    }

    let news_path = news_file.display().to_string();
    let static_path = static_dir.display().to_string();
    let config = Config::from_lookup(|key| match key {
        "SUPABASE_URL" => Some(url.clone()),
        "SUPABASE_KEY" => Some("test-key".to_string()),
        "HOST" => Some("127.0.0.1".to_string()),
        "PORT" => Some("0".to_string()),
        "NEWS_FILE" => Some(news_path.clone()),
        "STATIC_DIR" => Some(static_path.clone()),
        other => env.iter().find(|(k, _)| *k == other).map(|(_, v)| v.to_string()),
    })
    .unwrap();

    let app = create_router(AppState::new(config).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        news_file,
        _dir: dir,
    }
}

async fn get(app: &TestApp, path: &str) -> (u16, Value) {
    let res = reqwest::get(format!("{}{}", app.base_url, path)).await.unwrap();
    let status = res.status().as_u16();
    let body = res.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

fn stored_titles(path: &Path) -> Vec<String> {
    let stored: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    stored
        .iter()
        .filter_map(|v| v["title"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn hospitals_are_returned_as_geojson() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/rest/v1/hospitals")
        .match_query(Matcher::UrlEncoded("select".into(), "id,name,geom".into()))
        .match_header("apikey", "test-key")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"id": 1, "name": "Nairobi Hospital", "geom": {"type": "Point", "coordinates": [36.8046, -1.2958]}},
                {"id": 2, "name": "Unmapped Clinic", "geom": null},
            ])
            .to_string(),
        )
        .create_async()
        .await;
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/hospitals").await;

    assert_eq!(status, 200);
    assert_eq!(body["type"], "FeatureCollection");
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["geometry"]["coordinates"], json!([36.8046, -1.2958]));
    assert_eq!(features[0]["properties"], json!({"id": 1, "name": "Nairobi Hospital"}));
    mock.assert_async().await;
}

#[tokio::test]
async fn hospitals_datastore_error_is_500() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/rest/v1/hospitals")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/hospitals").await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "Error fetching hospitals data"}));
}

#[tokio::test]
async fn nearest_hospital_is_found() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/rest/v1/rpc/nearest_hospital")
        .match_body(Matcher::Json(json!({"start_lat": -1.30, "start_lng": 36.82})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([{"id": 4, "name": "Mbagathi Hospital", "latitude": -1.29, "longitude": 36.82}]).to_string(),
        )
        .create_async()
        .await;
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/nearest-hospital?start_lat=-1.30&start_lng=36.82").await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"id": 4, "name": "Mbagathi Hospital", "latitude": -1.29, "longitude": 36.82})
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn out_of_range_start_is_rejected_without_datastore_call() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/rest/v1/rpc/nearest_hospital")
        .expect(0)
        .create_async()
        .await;
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/nearest-hospital?start_lat=200&start_lng=36.82").await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "Invalid start coordinates"}));

    let (status, _) = get(&app, "/api/nearest-hospital?start_lat=-1.3").await;
    assert_eq!(status, 400);

    mock.assert_async().await;
}

#[tokio::test]
async fn nearest_hospital_empty_result_is_404() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/rest/v1/rpc/nearest_hospital")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/nearest-hospital?start_lat=-1.30&start_lng=36.82").await;

    assert_eq!(status, 404);
    assert_eq!(body, json!({"error": "No hospitals found"}));
}

#[tokio::test]
async fn tips_come_from_their_category_table() {
    let mut server = Server::new_async().await;
    let mut mocks = Vec::new();
    for (table, tip) in [
        ("fire_tips", "Stop, drop and roll"),
        ("accident_tips", "Do not move the injured"),
        ("flood_tips", "Move to higher ground"),
        ("collapse_tips", "Cover your mouth from dust"),
    ] {
        mocks.push(
            server
                .mock("GET", format!("/rest/v1/{}", table).as_str())
                .match_query(Matcher::UrlEncoded("select".into(), "tip".into()))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(json!([{"tip": tip}]).to_string())
                .create_async()
                .await,
        );
    }
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/fire-tips").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!([{"tip": "Stop, drop and roll"}]));

    let (_, body) = get(&app, "/api/accident-tips").await;
    assert_eq!(body, json!([{"tip": "Do not move the injured"}]));
    let (_, body) = get(&app, "/api/flood-tips").await;
    assert_eq!(body, json!([{"tip": "Move to higher ground"}]));
    let (_, body) = get(&app, "/api/collapse-tips").await;
    assert_eq!(body, json!([{"tip": "Cover your mouth from dust"}]));

    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn tips_error_is_500() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/rest/v1/flood_tips")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/flood-tips").await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "Internal Server Error"}));
}

#[tokio::test]
async fn emergency_contacts_are_listed() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/rest/v1/emergency_contacts")
        .match_query(Matcher::UrlEncoded(
            "select".into(),
            "emergency_type,contact_number,description".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([{"emergency_type": "Fire", "contact_number": "999", "description": "Fire brigade"}]).to_string(),
        )
        .create_async()
        .await;
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/emergency-contacts").await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!([{"emergency_type": "Fire", "contact_number": "999", "description": "Fire brigade"}])
    );
}

#[tokio::test]
async fn disaster_news_rotates_and_archives_breaking_items() {
    let now = Utc::now();
    let a_date = (now - Duration::minutes(30)).to_rfc3339();
    let b_date = (now - Duration::hours(2)).to_rfc3339();
    let c_date = (now - Duration::hours(25)).to_rfc3339();

    let mut server = Server::new_async().await;
    let archive = server
        .mock("POST", "/rest/v1/news")
        .match_header("prefer", "return=minimal")
        .match_body(Matcher::Json(json!([
            {"title": "A", "content": "Fire at Gikomba market", "reported_at": a_date},
        ])))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    let app = spawn_app(
        &server,
        Some(json!([
            {"title": "A", "description": "Fire at Gikomba market", "date": a_date},
            {"title": "B", "description": "Flooding in Kibera", "date": b_date},
            {"title": "C", "description": "Old news", "date": c_date},
        ])),
    )
    .await;

    let (status, body) = get(&app, "/api/disaster-news").await;

    assert_eq!(status, 200);
    let breaking: Vec<&str> = body["breaking_news"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["title"].as_str())
        .collect();
    let all: Vec<&str> = body["all_news"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["title"].as_str())
        .collect();
    assert_eq!(breaking, vec!["A"]);
    assert_eq!(all, vec!["A", "B"]);
    assert_eq!(body["all_news"][0]["date"], a_date.as_str());

    assert_eq!(stored_titles(&app.news_file), vec!["A", "B"]);

    // Archival is detached; give it a moment to land.
    for _ in 0..50 {
        if archive.matched_async().await {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    archive.assert_async().await;
}

#[tokio::test]
async fn archival_failure_does_not_affect_news_response() {
    let now = Utc::now();
    let mut server = Server::new_async().await;
    let _archive = server
        .mock("POST", "/rest/v1/news")
        .with_status(500)
        .with_body("insert failed")
        .create_async()
        .await;
    let app = spawn_app(
        &server,
        Some(json!([
            {"title": "A", "description": "a", "date": (now - Duration::minutes(1)).to_rfc3339()},
        ])),
    )
    .await;

    let (status, body) = get(&app, "/api/disaster-news").await;

    assert_eq!(status, 200);
    assert_eq!(body["breaking_news"].as_array().unwrap().len(), 1);
    assert_eq!(body["all_news"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn no_archival_when_nothing_is_breaking() {
    let now = Utc::now();
    let mut server = Server::new_async().await;
    let archive = server
        .mock("POST", "/rest/v1/news")
        .expect(0)
        .create_async()
        .await;
    let app = spawn_app(
        &server,
        Some(json!([
            {"title": "B", "description": "b", "date": (now - Duration::hours(3)).to_rfc3339()},
        ])),
    )
    .await;

    let (status, body) = get(&app, "/api/disaster-news").await;

    assert_eq!(status, 200);
    assert_eq!(body["breaking_news"], json!([]));
    assert_eq!(stored_titles(&app.news_file), vec!["B"]);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    archive.assert_async().await;
}

#[tokio::test]
async fn missing_news_file_is_500() {
    let server = Server::new_async().await;
    let app = spawn_app(&server, None).await;

    let (status, body) = get(&app, "/api/disaster-news").await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "Could not read the file."}));
}

#[tokio::test]
async fn corrupt_news_file_is_500() {
    let server = Server::new_async().await;
    let app = spawn_app(&server, Some(json!({"not": "an array"}))).await;

    let (status, body) = get(&app, "/api/disaster-news").await;

    assert_eq!(status, 500);
    assert_eq!(body, json!({"error": "Could not parse the JSON data."}));
}

#[tokio::test]
async fn index_is_served_from_static_dir() {
    let server = Server::new_async().await;
    let app = spawn_app(&server, None).await;

    let res = reqwest::get(format!("{}/", app.base_url)).await.unwrap();

    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.text().await.unwrap(), "<h1>Disaster Portal</h1>");
}

/// Accepts connections and never answers them.
async fn stalled_datastore() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn slow_datastore_hits_the_request_timeout() {
    let url = stalled_datastore().await;
    let app = spawn_app_with(url, None, &[("REQUEST_TIMEOUT_SECS", "1")]).await;

    let started = std::time::Instant::now();
    let (status, body) = get(&app, "/api/hospitals").await;

    assert_eq!(status, 504);
    assert_eq!(body, json!({"error": "Error fetching hospitals data"}));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}
