// CSV roster import against a real database (skipped without TEST_DATABASE_URL)

mod common;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pretty_assertions::assert_eq;
use sqlx::PgPool;

use common::{app, create_test_player, fake_player_name, login, send, test_config, test_pool};
use swing_coach::models::Instructor;
use swing_coach::services::{
    ImportError, ImportOptions, InstructorService, MetricService, PlayerService,
    RosterImportService, SmsService,
};

fn importer(pool: &PgPool) -> RosterImportService {
    RosterImportService::new(pool.clone(), SmsService::new(None, None).unwrap())
}

async fn instructor(pool: &PgPool) -> Instructor {
    InstructorService::new(pool.clone())
        .create_instructor("Import Coach")
        .await
        .unwrap()
}

async fn count_named(pool: &PgPool, names: &[&str]) -> i64 {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    sqlx::query_scalar("SELECT COUNT(*) FROM players WHERE name = ANY($1)")
        .bind(&names)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn multipart_request(uri: &str, token: &str, csv: &str) -> Request<Body> {
    let boundary = "swing-coach-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"roster.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = boundary,
        csv = csv
    );

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn strict_import_with_bad_row_writes_nothing() {
    let Some(pool) = test_pool().await else { return };
    let coach = instructor(&pool).await;
    let players = PlayerService::new(pool.clone());
    let existing = create_test_player(&players, 12).await;

    let good = fake_player_name();
    let csv = format!("name,age\n{},10\n{},11\nBad Age,200\n", good, existing.name);

    let result = importer(&pool)
        .import(csv.as_bytes(), coach.id, ImportOptions { strict: true, notify: false })
        .await;

    assert_matches!(result, Err(ImportError::Rejected { ref errors, .. }) if errors.len() == 1 && errors[0].line == 4);
    assert_eq!(count_named(&pool, &[&good]).await, 0);

    let unchanged = players.get_player(existing.id).await.unwrap().unwrap();
    assert_eq!(unchanged.age, existing.age);
    assert_eq!(unchanged.login_code, existing.login_code);
    assert_eq!(count_named(&pool, &[&existing.name]).await, 1);
}

#[tokio::test]
async fn partial_import_keeps_valid_rows_and_reports_the_rest() {
    let Some(pool) = test_pool().await else { return };
    let coach = instructor(&pool).await;

    let first = fake_player_name();
    let second = fake_player_name();
    let csv = format!(
        "Player,Age,Phone,EV,Launch_Angle\n{},9,(555) 010-2000,55.5,12\n{},15,,,\n,12,,,\n{},9,,,\n",
        first, second, first
    );

    let report = importer(&pool)
        .import(csv.as_bytes(), coach.id, ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(report.imported.len(), 2);
    let lines: Vec<u64> = report.errors.iter().map(|e| e.line).collect();
    assert_eq!(lines, vec![4, 5]);
    assert_eq!(count_named(&pool, &[&first, &second]).await, 2);

    let imported = &report.imported[0];
    assert_eq!(imported.line, 2);
    assert_eq!(imported.login_code.len(), 6);

    let metrics = MetricService::new(pool.clone())
        .metrics_for_player(imported.id)
        .await
        .unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].exit_velocity, Some(55.5));
    assert_eq!(metrics[0].launch_angle, Some(12.0));

    let player = PlayerService::new(pool.clone())
        .get_player(imported.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(player.phone.as_deref(), Some("+15550102000"));
    assert_eq!(player.instructor_id, Some(coach.id));
}

/// Make inserts of players named `Import Failure ...` raise inside Postgres
async fn install_failing_insert_trigger(pool: &PgPool) {
    sqlx::query(
        "CREATE OR REPLACE FUNCTION reject_import_failure_player() RETURNS trigger AS $$
         BEGIN
             IF NEW.name LIKE 'Import Failure %' THEN
                 RAISE EXCEPTION 'refusing player %', NEW.name;
             END IF;
             RETURN NEW;
         END;
         $$ LANGUAGE plpgsql",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query("DROP TRIGGER IF EXISTS reject_import_failure_player ON players")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_import_failure_player BEFORE INSERT ON players
         FOR EACH ROW EXECUTE FUNCTION reject_import_failure_player()",
    )
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn database_failure_mid_import_rolls_back_earlier_rows() {
    let Some(pool) = test_pool().await else { return };
    install_failing_insert_trigger(&pool).await;
    let coach = instructor(&pool).await;

    let first = fake_player_name();
    let second = fake_player_name();
    let failing = format!("Import Failure {}", uuid::Uuid::new_v4().simple());
    let last = fake_player_name();
    let csv = format!(
        "name,age,exit_velocity\n{},10,60\n{},11,\n{},12,\n{},13,\n",
        first, second, failing, last
    );

    let result = importer(&pool)
        .import(csv.as_bytes(), coach.id, ImportOptions::default())
        .await;

    assert_matches!(result, Err(ImportError::Internal(_)));
    assert_eq!(count_named(&pool, &[&first, &second, &failing, &last]).await, 0);
}

#[tokio::test]
async fn file_without_valid_rows_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let coach = instructor(&pool).await;

    let result = importer(&pool)
        .import(b"name,age\n,10\nNobody,abc\n", coach.id, ImportOptions::default())
        .await;

    assert_matches!(result, Err(ImportError::Rejected { ref errors, .. }) if errors.len() == 2);
}

#[tokio::test]
async fn import_endpoint_reports_rejection_and_requires_instructor() {
    let Some(pool) = test_pool().await else { return };
    let coach = instructor(&pool).await;
    let players = PlayerService::new(pool.clone());
    let player = create_test_player(&players, 13).await;
    let app = app(pool.clone(), &test_config());

    let coach_token = login(&app, &coach.login_code).await;
    let csv = format!("name,age\n{},10\nToo Old,99\n", fake_player_name());

    let (status, body) = send(
        &app,
        multipart_request("/api/instructor/import?strict=true", &coach_token, &csv),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error_code"], "IMPORT_REJECTED");
    assert_eq!(body["details"][0]["line"], 3);

    let (status, body) = send(
        &app,
        multipart_request("/api/instructor/import", &coach_token, &csv),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imported"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        multipart_request("/api/instructor/import", &coach_token, "player,phone\nSam,5551234567\n"),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "The file is missing the required 'age' column");

    let player_token = login(&app, &player.login_code).await;
    let (status, _) = send(
        &app,
        multipart_request("/api/instructor/import", &player_token, &csv),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
