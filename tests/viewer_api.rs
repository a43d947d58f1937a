mod common;

use actix_web::http::StatusCode;
use serde_json::json;

use common::{get, init_app, login, post, register, seeded_batch};

#[actix_web::test]
async fn students_see_only_their_own_records() {
    let app = init_app().await;
    let (teacher, batch, ids) = seeded_batch(&app, "v1", &["va", "vb"]).await;
    let (va, vb) = (ids[0], ids[1]);

    post(
        &app,
        &format!("/admin/batches/{batch}/attendance"),
        &teacher,
        json!({
            "date": "2024-01-10",
            "records": [
                {"studentId": va, "status": "present"},
                {"studentId": vb, "status": "absent", "remarks": "sick"}
            ]
        }),
    )
    .await;
    post(
        &app,
        &format!("/admin/batches/{batch}/tests"),
        &teacher,
        json!({
            "name": "Quiz",
            "maxMarks": 10,
            "date": "2024-01-12",
            "scores": [{"studentId": va, "marks": 9}, {"studentId": vb, "marks": 4}]
        }),
    )
    .await;
    post(
        &app,
        &format!("/admin/batches/{batch}/fees"),
        &teacher,
        json!({ "studentId": vb, "amount": 900, "status": "overdue" }),
    )
    .await;

    let token = login(&app, "vb").await;

    let (status, batches) = get(&app, "/user/student/batches", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batches["batches"][0]["id"], batch);

    let (_, attendance) = get(&app, &format!("/user/student/batches/{batch}/attendance"), &token).await;
    let entries = attendance["attendance"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["date"], "2024-01-10");
    assert_eq!(entries[0]["status"], "absent");
    assert_eq!(entries[0]["remarks"], "sick");
    assert!(entries[0].get("records").is_none());

    let (_, tests) = get(&app, &format!("/user/student/batches/{batch}/tests"), &token).await;
    assert_eq!(tests["tests"][0]["marks"], 4.0);
    assert_eq!(tests["tests"][0]["maxMarks"], 10.0);

    let (_, fee) = get(&app, &format!("/user/student/batches/{batch}/fees"), &token).await;
    assert_eq!(fee["fee"]["studentId"], vb);
    assert_eq!(fee["fee"]["status"], "overdue");

    // va has no fee recorded
    let va_token = login(&app, "va").await;
    let (status, fee) = get(&app, &format!("/user/student/batches/{batch}/fees"), &va_token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(fee["fee"].is_null());
}

#[actix_web::test]
async fn unenrolled_batches_look_missing() {
    let app = init_app().await;
    let (_, batch, _) = seeded_batch(&app, "v2", &["vc"]).await;
    register(&app, "stranger", "student", None).await;
    let token = login(&app, "stranger").await;

    for suffix in ["", "/attendance", "/tests", "/fees", "/timetable", "/announcements"] {
        let (status, body) = get(&app, &format!("/user/student/batches/{batch}{suffix}"), &token).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{suffix}: {body}");
    }
    let (_, batches) = get(&app, "/user/student/batches", &token).await;
    assert!(batches["batches"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn parents_read_their_linked_child() {
    let app = init_app().await;
    let (teacher, batch, ids) = seeded_batch(&app, "v3", &["child", "other"]).await;
    register(&app, "guardian", "parent", Some(ids[0])).await;
    let parent = login(&app, "guardian").await;

    post(
        &app,
        &format!("/admin/batches/{batch}/announcements"),
        &teacher,
        json!({ "title": "Holiday", "body": "No class on Friday" }),
    )
    .await;
    post(
        &app,
        &format!("/admin/batches/{batch}/attendance"),
        &teacher,
        json!({
            "date": "2024-03-01",
            "records": [
                {"studentId": ids[0], "status": "absent"},
                {"studentId": ids[1], "status": "present"}
            ]
        }),
    )
    .await;

    let (status, body) = get(&app, &format!("/user/parent/batches/{batch}/attendance"), &parent).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["attendance"][0]["status"], "absent");

    let (_, body) = get(&app, &format!("/user/parent/batches/{batch}/announcements"), &parent).await;
    assert_eq!(body["announcements"][0]["title"], "Holiday");

    // the path must match the caller's role
    let (status, _) = get(&app, "/user/student/batches", &parent).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let child = login(&app, "child").await;
    let (status, _) = get(&app, "/user/parent/batches", &child).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = get(&app, "/user/parent/batches", &teacher).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
