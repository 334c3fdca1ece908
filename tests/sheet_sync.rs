use chrono::NaiveDate;
use fractic_pos_settlement::{
    config::{GoogleConfig, PosConfig},
    entities::{CartLine, CategoryKind, CategorySpec, LocationSpec, ADMIN_ROLE},
    util::PosSettlementUtil,
};
use pretty_assertions::assert_eq;
use wiremock::{
    matchers::{header, method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

async fn sell_one_tea(pos: &PosSettlementUtil) {
    let date = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
    pos.auth().ensure_admin_role().await.unwrap();
    let admin = pos
        .auth()
        .create_user("admin", None, "s3cret", &[ADMIN_ROLE])
        .await
        .unwrap();
    let location = pos
        .admin()
        .add_location(
            &admin,
            LocationSpec {
                name: "Harbor".into(),
                slug: "harbor".into(),
            },
        )
        .await
        .unwrap();
    let tea = pos
        .admin()
        .add_category(
            &admin,
            location.id,
            CategorySpec::new("Tea", "#2e7d32", CategoryKind::Product),
        )
        .await
        .unwrap();
    pos.cashier()
        .start_day(
            &admin,
            "harbor",
            date,
            500.0,
            None,
            date.and_hms_opt(9, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    pos.cashier()
        .record_transaction(
            &admin,
            "harbor",
            date,
            date.and_hms_opt(10, 15, 0).unwrap(),
            &[CartLine::new(tea.id, 2, 60.0)],
            None,
        )
        .await
        .unwrap();
}

fn config(dir: &std::path::Path, server: &MockServer) -> PosConfig {
    PosConfig {
        google: GoogleConfig {
            token_path: dir.join("token.json"),
            drive_api_url: server.uri(),
            sheets_api_url: server.uri(),
            background_sync: false,
        },
        ..PosConfig::default()
    }
}

#[tokio::test]
async fn transactions_are_appended_to_the_month_sheet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", "Bearer live-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "files": [{ "id": "f1" }] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/f1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "sheets": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/f1:batchUpdate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v4/spreadsheets/f1/values/.+:append$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("token.json"),
        serde_json::json!({
            "token": "live-token",
            "refresh_token": "r",
            "expiry": "2999-01-01T00:00:00Z",
        })
        .to_string(),
    )
    .unwrap();
    let pos = PosSettlementUtil::open_in_memory(config(dir.path(), &server)).unwrap();
    sell_one_tea(&pos).await;

    let requests = server.received_requests().await.unwrap();
    let append = requests
        .iter()
        .find(|r| r.url.path().ends_with(":append"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&append.body).unwrap();
    let rows = body["values"].as_array().unwrap();
    // New sheet: header first, then the transaction.
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], "2025-06-14 10:15:00");
    assert_eq!(rows[1][1], "120");
    assert_eq!(rows[1][2], "2");
    server.verify().await;
}

#[tokio::test]
async fn selling_works_without_google_credentials() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let pos = PosSettlementUtil::open_in_memory(config(dir.path(), &server)).unwrap();
    sell_one_tea(&pos).await;
    assert!(server.received_requests().await.unwrap().is_empty());
}
