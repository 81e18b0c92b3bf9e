use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct Lot {
    code: String,
    quantity: u32,
    expiry_date: String,
}

#[derive(Debug, Deserialize)]
struct KitItem {
    code: String,
    max_quantity: u32,
    current_quantity: u32,
    expiry_dates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Kit {
    id: String,
    name: String,
    is_standard: bool,
    items: Vec<KitItem>,
}

#[derive(Debug, Deserialize)]
struct Adjustment {
    requested: i64,
    applied: i64,
    current_quantity: u32,
    outcome: String,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

fn unique_data_path() -> String {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "kit_manager_http_{}_{}.json",
        std::process::id(),
        unique_suffix()
    ));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    // nothing listens here, so every backend call fails fast
    let offline = format!("http://127.0.0.1:{}", pick_free_port());
    let child = Command::new(env!("CARGO_BIN_EXE_kit_manager"))
        .env("PORT", port.to_string())
        .env("APP_DATA_PATH", unique_data_path())
        .env("FAM_API_BASE", format!("{offline}/api"))
        .env("FAM_REPORT_BASE", &offline)
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

async fn create_custom_kit(client: &Client, base_url: &str, name: &str) -> Kit {
    let response = client
        .post(format!("{base_url}/api/kits"))
        .json(&json!({ "name": name, "location": "Magazzino", "kit_type": "custom" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn add_lot(client: &Client, base_url: &str, code: &str, quantity: u32, expiry: &str) -> Lot {
    let response = client
        .post(format!("{base_url}/api/warehouse"))
        .json(&json!({ "code": code, "quantity": quantity, "expiry_date": expiry }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

async fn adjust(client: &Client, base_url: &str, kit_id: &str, code: &str, delta: i64) -> Adjustment {
    client
        .post(format!("{base_url}/api/kits/{kit_id}/items/{code}/adjust"))
        .json(&json!({ "delta": delta }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn http_health_reports_ok() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let body: Value = Client::new()
        .get(format!("{}/api/health", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn http_adjust_draws_earliest_lots_and_reports_shortfall() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;
    let code = format!("gauze-{}", unique_suffix());

    let late = add_lot(&client, base, &code, 3, "2099-01-01").await;
    let early = add_lot(&client, base, &code, 1, "2098-06-01").await;
    assert_eq!(late.code, code);
    assert_eq!(early.quantity, 1);
    assert_eq!(early.expiry_date, "2098-06-01");

    let kit = create_custom_kit(&client, base, &format!("Kit {code}")).await;
    assert!(!kit.is_standard);
    assert!(kit.items.is_empty());

    let response = client
        .post(format!("{base}/api/kits/{}/items", kit.id))
        .json(&json!({ "code": code, "max_quantity": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let outcome = adjust(&client, base, &kit.id, &code, 5).await;
    assert_eq!(outcome.outcome, "shortfall");
    assert_eq!(outcome.requested, 5);
    assert_eq!(outcome.applied, 4);
    assert_eq!(outcome.current_quantity, 4);

    let remaining: Vec<Lot> = client
        .get(format!("{base}/api/warehouse"))
        .query(&[("code", code.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(remaining.is_empty(), "drained lots are removed: {remaining:?}");

    let returned = adjust(&client, base, &kit.id, &code, -1).await;
    assert_eq!(returned.outcome, "applied");
    assert_eq!(returned.current_quantity, 3);

    let kits: Vec<Kit> = client
        .get(format!("{base}/api/kits"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let stored = kits.iter().find(|k| k.id == kit.id).expect("kit listed");
    let item = &stored.items[0];
    assert_eq!(item.code, code);
    assert_eq!(item.max_quantity, 10);
    assert_eq!(item.current_quantity, 3);
    // the earliest date was handed back first
    assert_eq!(item.expiry_dates, vec!["2099-01-01"; 3]);
}

#[tokio::test]
async fn http_adjust_outside_bounds_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let base = &server.base_url;
    let code = format!("tape-{}", unique_suffix());

    add_lot(&client, base, &code, 10, "2099-03-01").await;
    let kit = create_custom_kit(&client, base, &format!("Kit {code}")).await;
    client
        .post(format!("{base}/api/kits/{}/items", kit.id))
        .json(&json!({ "code": code, "max_quantity": 2 }))
        .send()
        .await
        .unwrap();

    let over = adjust(&client, base, &kit.id, &code, 3).await;
    assert_eq!(over.outcome, "rejected");
    assert_eq!(over.current_quantity, 0);

    let under = adjust(&client, base, &kit.id, &code, -1).await;
    assert_eq!(under.outcome, "rejected");

    let lots: Vec<Lot> = client
        .get(format!("{base}/api/warehouse"))
        .query(&[("code", code.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(lots.len(), 1);
    assert_eq!(lots[0].quantity, 10);

    let response = client
        .post(format!("{base}/api/kits/{}/items/unknown/adjust", kit.id))
        .json(&json!({ "delta": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn http_kit_names_are_unique_ignoring_case() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let name = format!("Cassetta {}", unique_suffix());

    create_custom_kit(&client, &server.base_url, &name).await;
    let response = client
        .post(format!("{}/api/kits", server.base_url))
        .json(&json!({ "name": name.to_uppercase() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn http_standard_kit_is_prepopulated() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let response = Client::new()
        .post(format!("{}/api/kits", server.base_url))
        .json(&json!({ "name": format!("Standard {}", unique_suffix()) }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let kit: Kit = response.json().await.unwrap();
    assert!(kit.is_standard);
    assert!(!kit.items.is_empty());
    assert!(kit.items.iter().all(|item| item.current_quantity == 0));
}

#[tokio::test]
async fn http_report_quality_check_blocks_generation() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    let kit = create_custom_kit(&client, &server.base_url, &format!("Report {}", unique_suffix())).await;

    let response = client
        .post(format!("{}/api/reports", server.base_url))
        .json(&json!({ "location": "X", "kit_ids": [kit.id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let message = response.text().await.unwrap();
    assert!(message.contains("location"), "{message}");

    let history: Vec<Value> = client
        .get(format!("{}/api/reports", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn http_settings_fall_back_to_local_copy_when_backend_is_down() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let saved: Value = client
        .patch(format!("{}/api/settings", server.base_url))
        .json(&json!({ "items": [{ "key": "smtp.port", "value": 587 }] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(saved["local_only"], true);
    assert_eq!(saved["settings"]["smtp"]["port"], 587);

    let mirror: Value = client
        .get(format!("{}/api/settings", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mirror["smtp"]["port"], 587);

    let single: Value = client
        .get(format!("{}/api/settings?key=smtp.port", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(single, json!(587));

    let fallback: Value = client
        .get(format!(
            "{}/api/settings?key=expiry.interval&default=30",
            server.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fallback, json!(30));

    let nested: Value = client
        .patch(format!("{}/api/settings", server.base_url))
        .json(&json!({ "values": { "company": { "name": "ACME", "vat": "IT01" } } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nested["local_only"], true);
    assert_eq!(nested["settings"]["company"]["vat"], "IT01");
    assert_eq!(nested["settings"]["smtp"]["port"], 587);

    let empty = client
        .patch(format!("{}/api/settings", server.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let sync = client
        .post(format!("{}/api/settings/sync", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(sync.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn http_materials_are_empty_without_backend() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let page: Value = Client::new()
        .get(format!("{}/api/materials?page=2&size=5", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 0);
    assert_eq!(page["page"], 2);
    assert_eq!(page["items"], json!([]));
}

#[tokio::test]
async fn http_material_writes_validate_before_calling_backend() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let missing_name = client
        .post(format!("{}/api/materials", server.base_url))
        .json(&json!({ "name": " ", "category": "Consumabili" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_name.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let offline = client
        .put(format!("{}/api/materials/4", server.base_url))
        .json(&json!({ "name": "Garze", "category": "Kit standard", "max_qty": 8 }))
        .send()
        .await
        .unwrap();
    assert_eq!(offline.status(), StatusCode::BAD_GATEWAY);

    let removed = client
        .delete(format!("{}/api/materials/4", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(removed.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn http_order_requires_an_operator() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let response = Client::new()
        .post(format!("{}/api/orders", server.base_url))
        .json(&json!({ "city": "Torino", "filter": "zero" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().await.unwrap().contains("operator"));
}

#[tokio::test]
async fn http_data_export_and_reset() {
    // a private server, since the reset wipes everything
    let server = spawn_server().await;
    let client = Client::new();
    create_custom_kit(&client, &server.base_url, "Export").await;

    let export = client
        .get(format!("{}/api/data/export", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(export.status(), StatusCode::OK);
    let disposition = export
        .headers()
        .get("content-disposition")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("first-aid-data-"), "{disposition}");
    let document: Value = export.json().await.unwrap();
    assert_eq!(document["kits"][0]["name"], "Export");

    let unconfirmed = client
        .delete(format!("{}/api/data", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(unconfirmed.status(), StatusCode::BAD_REQUEST);

    let reset = client
        .delete(format!("{}/api/data?confirm=true", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::NO_CONTENT);

    let kits: Vec<Kit> = client
        .get(format!("{}/api/kits", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(kits.is_empty());
}

#[tokio::test]
async fn http_notification_rejects_bad_recipient() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let response = Client::new()
        .post(format!("{}/api/notify/zero-quantity", server.base_url))
        .json(&json!({ "recipient": "not-an-address", "subject": "Scorte" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let preview: Value = Client::new()
        .get(format!("{}/api/notify/expiring/preview", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(preview["kind"], "expiring");
    assert!(preview["body"].as_str().unwrap().contains("Per assistenza"));
}

#[tokio::test]
async fn http_users_require_names_and_feed_audit() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/api/users", server.base_url))
        .json(&json!({ "first_name": "Anna", "last_name": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let kit = create_custom_kit(&client, &server.base_url, &format!("Audit {}", unique_suffix())).await;
    let audit: Vec<Value> = client
        .get(format!("{}/api/audit", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(audit[0]["action"], "add_kit");
    assert_eq!(audit[0]["element_id"], kit.id.as_str());
    assert_eq!(kit.name.split(' ').next(), Some("Audit"));
}
