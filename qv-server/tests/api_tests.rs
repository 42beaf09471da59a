//! HTTP surface tests: identity, roles, settings, users and error mapping

mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{at, TestApp, ADMIN, OPERATOR, OTHER_OPERATOR, QUALITY, SUPERVISOR};

#[tokio::test]
async fn test_health_needs_no_identity() {
    let app = TestApp::new().await;

    let (status, _, body) = app.raw("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "qv-server");
    assert_eq!(json["database"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_dashboard_page_served() {
    let app = TestApp::new().await;

    let (status, _, body) = app.raw("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(body).unwrap();
    assert!(page.contains("Quality Verification"));
    assert!(page.contains("Export .xlsx"));
    assert!(page.trim_end().ends_with("</html>"));
}

#[tokio::test]
async fn test_identity_required() {
    let app = TestApp::new().await;

    let (status, _, _) = app.raw("GET", "/api/shift/current", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/api/shift/current", "nobody").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_current_shift_follows_pattern() {
    let app = TestApp::new().await;

    let (status, current) = app.get("/api/shift/current", OPERATOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["pattern"], "rotating");
    assert_eq!(current["shift"], "A");
    assert_eq!(current["date"], "2024-03-04");
    assert_eq!(current["start"], "2024-03-04T06:30:00");
    assert_eq!(current["end"], "2024-03-04T15:00:00");

    let (status, _) = app
        .put("/api/settings", ADMIN, json!({ "shift_pattern": "twelve_hour" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, current) = app.get("/api/shift/current", OPERATOR).await;
    assert_eq!(current["pattern"], "twelve_hour");
    assert_eq!(current["shift"], "S1");

    app.clock.set(at(4, 20, 0));
    let (_, current) = app.get("/api/shift/current", OPERATOR).await;
    assert_eq!(current["shift"], "S2");
    assert_eq!(current["end"], "2024-03-05T06:30:00");
}

#[tokio::test]
async fn test_settings_are_admin_only_and_validated() {
    let app = TestApp::new().await;

    let (status, settings) = app.get("/api/settings", OPERATOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["sampling_interval_minutes"], 120);
    assert_eq!(settings["sampling_max_subgroups"], 6);

    let (status, _) = app
        .put("/api/settings", SUPERVISOR, json!({ "sampling_max_subgroups": 4 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .put("/api/settings", ADMIN, json!({ "sampling_interval_minutes": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            "/api/settings",
            ADMIN,
            json!({ "sampling_interval_minutes": 100_000_000_000i64 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put("/api/settings", ADMIN, json!({ "sampling_max_subgroups": 100_000 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, unchanged) = app.get("/api/settings", OPERATOR).await;
    assert_eq!(unchanged["sampling_interval_minutes"], 120);
    assert_eq!(unchanged["sampling_max_subgroups"], 6);

    let (status, _) = app
        .put("/api/settings", ADMIN, json!({ "shift_pattern": "weekly" }))
        .await;
    assert!(status.is_client_error());

    let (status, updated) = app
        .put("/api/settings", ADMIN, json!({ "sampling_max_subgroups": 4 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["sampling_max_subgroups"], 4);
    assert_eq!(updated["sampling_interval_minutes"], 120);
}

#[tokio::test]
async fn test_new_checklists_use_replaced_sampling_config() {
    let app = TestApp::new().await;

    // Attached before the change: keeps the six-slot plan
    let first = app.open_verification(OPERATOR).await;
    let checklist = app.create_checklist(OPERATOR, &first, "VX-200").await;
    let first_id = checklist["id"].as_str().unwrap().to_string();
    let (_, gate) = app
        .get(&format!("/api/checklists/{}/subgroup-gate", first_id), OPERATOR)
        .await;
    assert_eq!(gate["max_subgroups"], 6);

    app.set_sampling(30, 3).await;

    let second = app.open_verification(OTHER_OPERATOR).await;
    let checklist = app.create_checklist(OTHER_OPERATOR, &second, "VX-200").await;
    assert_eq!(checklist["gate"]["max_subgroups"], 3);
    assert_eq!(checklist["gate"]["unlocked"], 3);

    let (_, gate) = app
        .get(&format!("/api/checklists/{}/subgroup-gate", first_id), OPERATOR)
        .await;
    assert_eq!(gate["max_subgroups"], 6);
}

#[tokio::test]
async fn test_user_administration() {
    let app = TestApp::new().await;
    let new_user = json!({ "username": "op3", "display_name": "Line 3 operator", "role": "operator" });

    let (status, _) = app.post("/api/users", SUPERVISOR, new_user.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/api/users", ADMIN, new_user.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "operator");
    assert_eq!(created["active"], true);

    let (status, _) = app.post("/api/users", ADMIN, new_user).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post(
            "/api/users",
            ADMIN,
            json!({ "username": "op 4", "display_name": "", "role": "operator" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The new user can act until deactivated
    let (status, _) = app.get("/api/shift/current", "op3").await;
    assert_eq!(status, StatusCode::OK);

    let id = created["id"].as_str().unwrap();
    let (status, updated) = app
        .put(&format!("/api/users/{}/active", id), ADMIN, json!({ "active": false }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["active"], false);

    let (status, _) = app.get("/api/shift/current", "op3").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, users) = app.get("/api/users", ADMIN).await;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 6);
    let admin_id = users
        .iter()
        .find(|u| u["username"] == ADMIN)
        .and_then(|u| u["id"].as_str())
        .unwrap();

    let (status, _) = app
        .put(&format!("/api/users/{}/active", admin_id), ADMIN, json!({ "active": false }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            &format!("/api/users/{}/active", Uuid::new_v4()),
            ADMIN,
            json!({ "active": true }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_records_are_not_found() {
    let app = TestApp::new().await;
    let missing = Uuid::new_v4();

    for uri in [
        format!("/api/verifications/{}", missing),
        format!("/api/checklists/{}", missing),
        format!("/api/equipment-checks/{}", missing),
        format!("/api/equipment-checks/{}/history", missing),
        format!("/api/ftq/{}", missing),
    ] {
        let (status, body) = app.get(&uri, SUPERVISOR).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    let (status, _) = app
        .call("POST", &format!("/api/ftq/{}/supervisor-approve", missing), SUPERVISOR, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call("DELETE", &format!("/api/defects/{}", missing), OPERATOR, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_paths_are_bad_requests() {
    let app = TestApp::new().await;

    let (status, _) = app
        .get(&format!("/api/history/invoice/{}", Uuid::new_v4()), QUALITY)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/checklists/not-a-uuid", QUALITY).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_verifications_by_date() {
    let app = TestApp::new().await;
    app.open_verification(OPERATOR).await;
    app.open_verification(OTHER_OPERATOR).await;

    let (status, records) = app.get("/api/verifications?date=2024-03-04", SUPERVISOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records.as_array().unwrap().len(), 2);

    // Defaults to today
    let (_, records) = app.get("/api/verifications", SUPERVISOR).await;
    assert_eq!(records.as_array().unwrap().len(), 2);

    let (_, records) = app.get("/api/verifications?date=2024-03-05", SUPERVISOR).await;
    assert!(records.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_reports() {
    let app = TestApp::new().await;

    let (status, rows) = app.get("/api/reports/checklists", SUPERVISOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows, json!([]));

    let (status, dashboard) = app.get("/api/reports/dashboard", SUPERVISOR).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["date"], "2024-03-04");
    assert_eq!(dashboard["total"], 0);

    let (status, _) = app
        .get("/api/reports/ftq?from=2024-03-04&to=2024-03-04&group_by=operator", SUPERVISOR)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
