//! API integration tests
//!
//! These run against a live server with its database migrated, started
//! separately. Run with: cargo test -- --ignored

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

async fn send_command(client: &Client, command: &str, payload: Value) -> Value {
    let response = client
        .post(format!("{}/command", BASE_URL))
        .json(&json!({ "command": command, "payload": payload }))
        .send()
        .await
        .expect("Failed to send command");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["command"], command, "response must echo the tag");
    body["payload"].clone()
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_unknown_command_echoes_tag() {
    let client = Client::new();
    let payload = send_command(&client, "FlyToTheMoon", Value::Null).await;
    assert!(payload["error"]
        .as_str()
        .expect("error payload")
        .contains("FlyToTheMoon"));
}

#[tokio::test]
#[ignore]
async fn test_malformed_payload_keeps_connection() {
    let client = Client::new();

    let payload = send_command(&client, "BorrowBook", json!({"book_id": "three"})).await;
    assert!(payload["error"].is_string());

    // Same client keeps working afterwards.
    let books = send_command(&client, "GetAllBooks", Value::Null).await;
    assert!(books.is_array());
}

#[tokio::test]
#[ignore]
async fn test_borrow_unknown_subscriber_is_rejected() {
    let client = Client::new();
    let payload = send_command(
        &client,
        "BorrowBook",
        json!({"book_id": 1, "subscriber_id": 999_999, "librarian_id": 1}),
    )
    .await;
    assert_eq!(payload, json!("Subscriber doesn't exist"));
}

#[tokio::test]
#[ignore]
async fn test_return_without_loan_is_rejected() {
    let client = Client::new();
    let payload = send_command(
        &client,
        "ReturnBook",
        json!({"book_id": 1, "subscriber_id": 999_999, "librarian_id": 1, "is_lost": false}),
    )
    .await;
    assert_eq!(
        payload,
        json!("No active loan found for this book and subscriber")
    );
}

#[tokio::test]
#[ignore]
async fn test_extend_without_loan_is_rejected() {
    let client = Client::new();
    let payload = send_command(
        &client,
        "ExtendLoan",
        json!({"subscriber_id": 999_999, "book_id": 1, "librarian_id": 0}),
    )
    .await;
    assert_eq!(
        payload,
        json!("No active loan found for this book and subscriber")
    );
}

#[tokio::test]
#[ignore]
async fn test_reserve_book_answers_with_a_token() {
    let client = Client::new();
    let payload = send_command(
        &client,
        "ReserveBook",
        json!({"subscriber_id": 1, "book_id": 1}),
    )
    .await;
    let token = payload.as_str().expect("token payload");
    assert!(
        [
            "success",
            "alreadyreserved",
            "alreadyborrowed",
            "nocopiesavailable",
            "canborrow",
            "databaseerror",
            "error"
        ]
        .contains(&token),
        "unexpected token: {token}"
    );
}

#[tokio::test]
#[ignore]
async fn test_borrow_then_return_round_trip() {
    let client = Client::new();

    // Assumes seed data: subscriber 1 is ACTIVE, book 1 has a free copy.
    let borrow = send_command(
        &client,
        "BorrowBook",
        json!({"book_id": 1, "subscriber_id": 1, "librarian_id": 1}),
    )
    .await;
    let message = borrow.as_str().expect("message payload");
    assert!(message.starts_with("Successfully borrowed book: "), "{message}");

    let ret = send_command(
        &client,
        "ReturnBook",
        json!({"book_id": 1, "subscriber_id": 1, "librarian_id": 1, "is_lost": false}),
    )
    .await;
    let message = ret.as_str().expect("message payload");
    assert!(message.starts_with("Successfully returned book: "), "{message}");

    // A second return of the same loan must be rejected.
    let again = send_command(
        &client,
        "ReturnBook",
        json!({"book_id": 1, "subscriber_id": 1, "librarian_id": 1, "is_lost": false}),
    )
    .await;
    assert_eq!(
        again,
        json!("No active loan found for this book and subscriber")
    );
}

#[tokio::test]
#[ignore]
async fn test_catalog_search_rows_carry_loan_columns() {
    let client = Client::new();
    let books = send_command(&client, "GetAllBooks", Value::Null).await;
    let first = &books.as_array().expect("book list")[0];
    let title = first["title"].as_str().expect("title");

    let rows = send_command(&client, "GetBookByName", json!(title)).await;
    let rows = rows.as_array().expect("search rows");
    assert!(!rows.is_empty(), "exact title search must find the book");
    for row in rows {
        assert_eq!(row["title"], json!(title));
        // Loan columns are null for shelved copies, present when out.
        assert!(row.get("holder_id").is_some());
        assert!(row.get("due_date").is_some());
    }
}

#[tokio::test]
#[ignore]
async fn test_author_search_matches_substrings() {
    let client = Client::new();
    let books = send_command(&client, "GetAllBooks", Value::Null).await;
    let with_author = books
        .as_array()
        .expect("book list")
        .iter()
        .find(|b| b["author"].is_string());
    let Some(book) = with_author else { return };

    let author = book["author"].as_str().expect("author");
    let fragment: String = author.chars().take(3).collect();
    let rows = send_command(&client, "GetBookByAuthor", json!(&fragment)).await;
    assert!(
        rows.as_array().expect("search rows").iter().any(|r| r["id"] == book["id"]),
        "author fragment {fragment:?} must match {author:?}"
    );
}

#[tokio::test]
#[ignore]
async fn test_search_miss_is_an_empty_list() {
    let client = Client::new();
    let rows = send_command(&client, "GetBookByTheme", json!("no-such-theme-zzz")).await;
    assert_eq!(rows, json!([]));
}

#[tokio::test]
#[ignore]
async fn test_member_registration_and_update() {
    let client = Client::new();

    let phone = format!("05{}", chrono::Utc::now().timestamp());
    let created = send_command(
        &client,
        "CreateMember",
        json!({"full_name": "Test Member", "phone": &phone}),
    )
    .await;
    let id = created["id"].as_i64().expect("created member record");
    assert_eq!(created["status"], json!("ACTIVE"));

    // The same phone number cannot be registered twice.
    let duplicate = send_command(
        &client,
        "CreateMember",
        json!({"full_name": "Someone Else", "phone": &phone}),
    )
    .await;
    assert_eq!(duplicate, json!("A member with this phone already exists"));

    let updated = send_command(
        &client,
        "UpdateMember",
        json!({"subscriber_id": id, "full_name": "Test Member Renamed", "phone": &phone}),
    )
    .await;
    assert_eq!(updated, json!("Success"));

    let missing = send_command(
        &client,
        "UpdateMember",
        json!({"subscriber_id": 999_999_99, "full_name": "Nobody"}),
    )
    .await;
    assert_eq!(missing, json!("Update failed"));
}

#[tokio::test]
#[ignore]
async fn test_availability_never_exceeds_total() {
    let client = Client::new();
    let books = send_command(&client, "GetAllBooks", Value::Null).await;
    for book in books.as_array().expect("book list") {
        let available = book["available_copies"].as_i64().expect("available");
        let total = book["total_copies"].as_i64().expect("total");
        assert!(available >= 0 && available <= total, "{book}");
    }
}

#[tokio::test]
#[ignore]
async fn test_loan_duration_chart_has_four_buckets() {
    let client = Client::new();
    let payload = send_command(&client, "GetLoanDurationChart", json!(30)).await;
    assert_eq!(payload.as_array().expect("series").len(), 4);
}

#[tokio::test]
#[ignore]
async fn test_late_return_chart_has_three_buckets() {
    let client = Client::new();
    let payload = send_command(&client, "GetLateReturnChart", json!(30)).await;
    assert_eq!(payload.as_array().expect("series").len(), 3);
}

#[tokio::test]
#[ignore]
async fn test_member_status_has_all_period_buckets() {
    let client = Client::new();
    let payload = send_command(&client, "GetMemberStatus", json!(30)).await;
    let map = payload.as_object().expect("distribution");
    for key in ["0-7", "8-14", "15-21", "22-30"] {
        let pair = map[key].as_array().expect("[active, frozen] pair");
        assert_eq!(pair.len(), 2);
    }
}

#[tokio::test]
#[ignore]
async fn test_same_day_chart_requests_reuse_snapshot() {
    let client = Client::new();
    let first = send_command(&client, "GetLoanDurationChart", json!(30)).await;
    let second = send_command(&client, "GetLoanDurationChart", json!(30)).await;
    assert_eq!(first, second);
}

#[tokio::test]
#[ignore]
async fn test_borrow_history_is_newest_first() {
    let client = Client::new();
    let history = send_command(&client, "GetBorrowHistory", json!(1)).await;
    let entries = history.as_array().expect("history list");
    let dates: Vec<&str> = entries
        .iter()
        .map(|e| e["loan_date"].as_str().expect("loan_date"))
        .collect();
    let mut sorted = dates.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(dates, sorted);
}

#[tokio::test]
#[ignore]
async fn test_notifications_listing_and_deletion() {
    let client = Client::new();
    let notifications = send_command(&client, "GetNotifications", json!(1)).await;
    assert!(notifications.is_array());

    // Deleting nothing reports false.
    let deleted = send_command(&client, "DeleteNotifications", json!([])).await;
    assert_eq!(deleted, json!(false));
}
