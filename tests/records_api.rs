mod common;

use actix_web::http::StatusCode;
use chrono::Utc;
use serde_json::json;

use common::{delete, get, init_app, post, put, seeded_batch};

#[actix_web::test]
async fn tests_validate_marks_and_replace_scores() {
    let app = init_app().await;
    let (token, batch, ids) = seeded_batch(&app, "t1", &["ta", "tb"]).await;
    let uri = format!("/admin/batches/{batch}/tests");

    let (status, _) = post(
        &app,
        &uri,
        &token,
        json!({
            "name": "Unit 1",
            "maxMarks": 50,
            "date": "2024-02-01",
            "scores": [{"studentId": ids[0], "marks": 51}]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = post(
        &app,
        &uri,
        &token,
        json!({
            "name": "Unit 1",
            "maxMarks": 50,
            "date": "2024-02-01",
            "scores": [
                {"studentId": ids[0], "marks": 42.5},
                {"studentId": ids[1], "marks": 30}
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let test_id = created["test"]["id"].as_u64().unwrap();

    // lowering the maximum below an existing score is refused
    let (status, _) = put(&app, &format!("{uri}/{test_id}"), &token, json!({ "maxMarks": 40 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = put(
        &app,
        &format!("{uri}/{test_id}"),
        &token,
        json!({ "maxMarks": 40, "scores": [{"studentId": ids[1], "marks": 38}] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["test"]["scores"].as_array().unwrap().len(), 1);

    let (status, _) = put(&app, &format!("{uri}/{test_id}"), &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = delete(&app, &format!("{uri}/{test_id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    let (_, listed) = get(&app, &uri, &token).await;
    assert!(listed["tests"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn fees_upsert_per_student_and_paid_is_final() {
    let app = init_app().await;
    let (token, batch, ids) = seeded_batch(&app, "f1", &["fa"]).await;
    let uri = format!("/admin/batches/{batch}/fees");

    let (status, first) = post(
        &app,
        &uri,
        &token,
        json!({ "studentId": ids[0], "amount": 1500, "status": "pending", "dueDate": "2024-01-31" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    let fee_id = first["fee"]["id"].as_u64().unwrap();

    let (_, second) = post(
        &app,
        &uri,
        &token,
        json!({ "studentId": ids[0], "amount": 1200, "status": "overdue" }),
    )
    .await;
    assert_eq!(second["fee"]["id"], fee_id);
    let (_, listed) = get(&app, &uri, &token).await;
    assert_eq!(listed["fees"].as_array().unwrap().len(), 1);

    let (status, paid) = put(
        &app,
        &format!("{uri}/{fee_id}"),
        &token,
        json!({ "status": "paid", "method": "upi" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{paid}");
    assert_eq!(paid["fee"]["status"], "paid");
    assert_eq!(
        paid["fee"]["paidOn"],
        Utc::now().date_naive().format("%Y-%m-%d").to_string()
    );

    let (status, err) = put(
        &app,
        &format!("{uri}/{fee_id}"),
        &token,
        json!({ "status": "pending" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "Fee status cannot change from paid to pending");

    let (status, _) = post(
        &app,
        &uri,
        &token,
        json!({ "studentId": ids[0], "amount": 1200, "status": "overdue" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post(
        &app,
        &uri,
        &token,
        json!({ "studentId": 424242, "amount": 10 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app,
        &uri,
        &token,
        json!({ "studentId": ids[0], "amount": -5 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn timetable_slots_are_unique_and_ordered() {
    let app = init_app().await;
    let (token, batch, _) = seeded_batch(&app, "w1", &[]).await;
    let uri = format!("/admin/batches/{batch}/timetable");

    let slot = |day: &str, period: u8, subject: &str| {
        json!({
            "day": day,
            "period": period,
            "subject": subject,
            "teacherName": "Asha Rao",
            "startTime": "09:00:00",
            "endTime": "09:45:00"
        })
    };

    post(&app, &uri, &token, slot("wednesday", 1, "Geometry")).await;
    post(&app, &uri, &token, slot("monday", 2, "Algebra")).await;
    let (status, replaced) = post(&app, &uri, &token, slot("monday", 2, "Statistics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["entry"]["subject"], "Statistics");

    let (_, listed) = get(&app, &uri, &token).await;
    let entries = listed["timetable"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["day"], "monday");
    assert_eq!(entries[0]["subject"], "Statistics");
    assert_eq!(entries[1]["day"], "wednesday");

    let mut backwards = slot("friday", 1, "Algebra");
    backwards["endTime"] = json!("08:00:00");
    let (status, _) = post(&app, &uri, &token, backwards).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let entry_id = entries[1]["id"].as_u64().unwrap();
    let (status, _) = delete(&app, &format!("{uri}/{entry_id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn announcements_are_newest_first() {
    let app = init_app().await;
    let (token, batch, _) = seeded_batch(&app, "a1", &[]).await;
    let uri = format!("/admin/batches/{batch}/announcements");

    for title in ["First", "Second"] {
        let (status, _) = post(&app, &uri, &token, json!({ "title": title, "body": "Details" })).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = post(&app, &uri, &token, json!({ "title": "  ", "body": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = get(&app, &uri, &token).await;
    let items = listed["announcements"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Second");

    let id = items[1]["id"].as_u64().unwrap();
    let (status, _) = delete(&app, &format!("{uri}/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn batch_crud_and_enrolment() {
    let app = init_app().await;
    let (token, batch, ids) = seeded_batch(&app, "c1", &["ca"]).await;

    let (status, detail) = get(&app, &format!("/admin/batches/{batch}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["batch"]["subject"], "Mathematics");
    assert_eq!(detail["batch"]["students"][0]["id"], ids[0]);

    let (status, _) = post(
        &app,
        &format!("/admin/batches/{batch}/students"),
        &token,
        json!({ "studentId": ids[0] }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, updated) = put(
        &app,
        &format!("/admin/batches/{batch}"),
        &token,
        json!({ "name": "Renamed" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["batch"]["name"], "Renamed");

    // whitespace-only text is empty once trimmed
    let (status, _) = put(
        &app,
        &format!("/admin/batches/{batch}"),
        &token,
        json!({ "name": "   " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(
        &app,
        "/admin/batches",
        &token,
        json!({ "name": "  ", "subject": "Physics" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post(
        &app,
        &format!("/admin/batches/{batch}/announcements"),
        &token,
        json!({ "title": " ", "body": "Holiday" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, students) = get(&app, "/admin/students?search=ca", &token).await;
    assert_eq!(students["students"].as_array().unwrap().len(), 1);

    let (status, _) = delete(&app, &format!("/admin/batches/{batch}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(&app, &format!("/admin/batches/{batch}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, batches) = get(&app, "/admin/batches", &token).await;
    assert!(batches["batches"].as_array().unwrap().is_empty());
}
