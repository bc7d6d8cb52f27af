// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row API client against a mock HTTP server.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use lectern_core::ids::new_placeholder_id;
use lectern_core::{
    AttendanceEntry, AttendanceProbe, CaptureMethod, Direction, LecternError, RemoteBackend,
    Role, Student,
};
use lectern_remote::RestClient;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const U1: &str = "5b0a6f0e-2c4d-4e8f-9a1b-3c5d7e9f1a2b";

fn client(server: &MockServer) -> RestClient {
    RestClient::new(
        &server.uri(),
        &SecretString::from("anon-key".to_string()),
        Duration::from_secs(2),
    )
    .unwrap()
}

fn local_entry() -> AttendanceEntry {
    AttendanceEntry {
        id: new_placeholder_id(),
        student_uuid: None,
        student_id: "S123".into(),
        student_name: "Ana Reyes".into(),
        timestamp: Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
        direction: Direction::CheckIn,
        method: CaptureMethod::Barcode,
        purpose: None,
        contact: None,
        library: "main".into(),
        course: None,
        year: None,
        level: None,
        strand: None,
    }
}

fn attendance_row(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "student_id": "S123",
        "student_name": "Ana Reyes",
        "timestamp": "2026-05-04T09:00:00+00:00",
        "type": "check-in",
        "method": "barcode",
        "library": "main",
        "course": "BSIT"
    })
}

#[tokio::test]
async fn requests_carry_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/students"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).ping().await.unwrap();
}

#[tokio::test]
async fn fetch_attendance_without_since_has_no_date_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/attendance"))
        .and(query_param("order", "timestamp.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([attendance_row(U1)])))
        .mount(&server)
        .await;

    let rows = client(&server).fetch_attendance(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, U1);

    let requests = server.received_requests().await.unwrap();
    assert!(
        !requests[0]
            .url
            .query_pairs()
            .any(|(k, _)| k == "timestamp")
    );
}

#[tokio::test]
async fn fetch_attendance_with_since_filters_by_timestamp() {
    let server = MockServer::start().await;
    let since = Utc.with_ymd_and_hms(2026, 4, 4, 0, 0, 0).unwrap();
    Mock::given(method("GET"))
        .and(path("/rest/v1/attendance"))
        .and(query_param("timestamp", format!("gte.{}", since.to_rfc3339())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    assert!(client(&server).fetch_attendance(Some(since)).await.unwrap().is_empty());
}

#[tokio::test]
async fn insert_attendance_returns_assigned_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/attendance"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!([{ "student_id": "S123", "type": "check-in" }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([attendance_row(U1)])))
        .mount(&server)
        .await;

    let stored = client(&server).insert_attendance(&local_entry()).await.unwrap();
    assert_eq!(stored.id, U1);
    assert_eq!(stored.course.as_deref(), Some("BSIT"));
}

#[tokio::test]
async fn find_matching_uses_business_key_and_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/attendance"))
        .and(query_param("student_id", "eq.S123"))
        .and(query_param("type", "eq.check-in"))
        .and(query_param("timestamp", "gte.2026-05-04T08:59:50+00:00"))
        .and(query_param("timestamp", "lte.2026-05-04T09:00:10+00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([attendance_row(U1)])))
        .mount(&server)
        .await;

    let probe = AttendanceProbe::for_entry(&local_entry(), Duration::from_secs(10));
    let found = client(&server).find_matching_attendance(&probe).await.unwrap();
    assert_eq!(found.map(|e| e.id).as_deref(), Some(U1));
}

#[tokio::test]
async fn update_student_targets_row_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/students"))
        .and(query_param("id", format!("eq.{U1}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": U1,
            "student_id": "S123",
            "name": "Ana R. Reyes",
            "library": "main",
            "user_type": "student"
        }])))
        .mount(&server)
        .await;

    let student = Student {
        id: U1.into(),
        student_id: "S123".into(),
        name: "Ana R. Reyes".into(),
        email: None,
        phone: None,
        course: None,
        year: None,
        level: None,
        strand: None,
        library: "main".into(),
        role: Role::Student,
        rfid: None,
        biometric_template: None,
        last_scan: None,
        registered_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        dirty: true,
    };
    let updated = client(&server).update_student(&student).await.unwrap();
    assert_eq!(updated.name, "Ana R. Reyes");
    assert!(!updated.dirty);
}

#[tokio::test]
async fn error_body_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/students"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let student = Student {
        id: new_placeholder_id(),
        student_id: "S123".into(),
        name: "Ana".into(),
        email: None,
        phone: None,
        course: None,
        year: None,
        level: None,
        strand: None,
        library: "main".into(),
        role: Role::Student,
        rfid: None,
        biometric_template: None,
        last_scan: None,
        registered_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        dirty: false,
    };
    let err = client(&server).insert_student(&student).await.unwrap_err();
    let LecternError::Remote { message, .. } = err else {
        panic!("expected remote error, got {err:?}");
    };
    assert!(message.contains("23505"));
    assert!(message.contains("duplicate key"));
}

#[tokio::test]
async fn slow_response_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/students"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let client = RestClient::new(
        &server.uri(),
        &SecretString::from("anon-key".to_string()),
        Duration::from_millis(100),
    )
    .unwrap();
    let err = client.fetch_students().await.unwrap_err();
    assert!(matches!(err, LecternError::Timeout { .. }));
    assert!(err.is_transient());
}
