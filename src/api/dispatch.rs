//! Command dispatcher
//!
//! The whole desk protocol is one endpoint taking an envelope
//! `{ "command": <tag>, "payload": <value> }` and answering with the same
//! shape. Malformed payloads and store faults are reported as an error
//! payload under the request's tag; the HTTP status stays 200 so stateful
//! desk clients keep their session.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::report::ReportKind,
    services::members::CreateMemberOutcome,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub command: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct ResponseEnvelope {
    pub command: String,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
struct LoanAction {
    book_id: i32,
    subscriber_id: i32,
    librarian_id: i32,
}

#[derive(Debug, Deserialize)]
struct ReturnAction {
    book_id: i32,
    subscriber_id: i32,
    librarian_id: i32,
    is_lost: bool,
}

#[derive(Debug, Deserialize)]
struct ReserveAction {
    subscriber_id: i32,
    book_id: i32,
}

#[derive(Debug, Deserialize)]
struct NewMember {
    full_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MemberUpdate {
    subscriber_id: i32,
    full_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

/// Closed set of desk commands.
#[derive(Debug)]
enum Command {
    BorrowBook(LoanAction),
    ReturnBook(ReturnAction),
    ExtendLoan(LoanAction),
    ReserveBook(ReserveAction),
    CreateMember(NewMember),
    UpdateMember(MemberUpdate),
    GetAllMembers,
    GetAllBooks,
    GetBookById(i32),
    GetBookByName(String),
    GetBookByAuthor(String),
    GetBookByTheme(String),
    GetBookByDescription(String),
    GetActivityLogs,
    GetActivityLogsByMember(i32),
    GetBorrowHistory(i32),
    GetNotifications(i32),
    DeleteNotifications(Vec<i32>),
    GetLoanDurationChart(i32),
    GetLateReturnChart(i32),
    GetMemberStatus(i32),
}

impl Command {
    fn parse(tag: &str, payload: Value) -> AppResult<Self> {
        fn arg<T: serde::de::DeserializeOwned>(tag: &str, payload: Value) -> AppResult<T> {
            serde_json::from_value(payload)
                .map_err(|e| AppError::Protocol(format!("invalid payload for {tag}: {e}")))
        }

        match tag {
            "BorrowBook" => Ok(Command::BorrowBook(arg(tag, payload)?)),
            "ReturnBook" => Ok(Command::ReturnBook(arg(tag, payload)?)),
            "ExtendLoan" => Ok(Command::ExtendLoan(arg(tag, payload)?)),
            "ReserveBook" => Ok(Command::ReserveBook(arg(tag, payload)?)),
            "CreateMember" => Ok(Command::CreateMember(arg(tag, payload)?)),
            "UpdateMember" => Ok(Command::UpdateMember(arg(tag, payload)?)),
            "GetAllMembers" => Ok(Command::GetAllMembers),
            "GetAllBooks" => Ok(Command::GetAllBooks),
            "GetBookById" => Ok(Command::GetBookById(arg(tag, payload)?)),
            "GetBookByName" => Ok(Command::GetBookByName(arg(tag, payload)?)),
            "GetBookByAuthor" => Ok(Command::GetBookByAuthor(arg(tag, payload)?)),
            "GetBookByTheme" => Ok(Command::GetBookByTheme(arg(tag, payload)?)),
            "GetBookByDescription" => Ok(Command::GetBookByDescription(arg(tag, payload)?)),
            "GetActivityLogs" => Ok(Command::GetActivityLogs),
            "GetActivityLogsByMember" => Ok(Command::GetActivityLogsByMember(arg(tag, payload)?)),
            "GetBorrowHistory" => Ok(Command::GetBorrowHistory(arg(tag, payload)?)),
            "GetNotifications" => Ok(Command::GetNotifications(arg(tag, payload)?)),
            "DeleteNotifications" => Ok(Command::DeleteNotifications(arg(tag, payload)?)),
            "GetLoanDurationChart" => Ok(Command::GetLoanDurationChart(arg(tag, payload)?)),
            "GetLateReturnChart" => Ok(Command::GetLateReturnChart(arg(tag, payload)?)),
            "GetMemberStatus" => Ok(Command::GetMemberStatus(arg(tag, payload)?)),
            other => Err(AppError::Protocol(format!("unknown command: {other}"))),
        }
    }
}

/// POST /api/v1/command
pub async fn dispatch(
    State(state): State<AppState>,
    Json(envelope): Json<Envelope>,
) -> Json<ResponseEnvelope> {
    let tag = envelope.command;
    tracing::debug!(command = %tag, "dispatching");

    let payload = match Command::parse(&tag, envelope.payload) {
        Ok(command) => match execute(&state, command).await {
            Ok(value) => value,
            Err(e) => error_payload(&tag, &e),
        },
        Err(e) => error_payload(&tag, &e),
    };

    Json(ResponseEnvelope { command: tag, payload })
}

/// Error payloads keep the tag of the request. `ReserveBook` speaks in
/// tokens, so its failures are tokens too.
fn error_payload(tag: &str, error: &AppError) -> Value {
    if tag != "ReserveBook" {
        tracing::warn!(command = %tag, error = %error, "command failed");
        return json!({ "error": error.to_string() });
    }
    match error {
        AppError::Database(e) => {
            tracing::error!(error = %e, "reservation failed on the store");
            Value::String("databaseerror".to_string())
        }
        other => {
            tracing::warn!(error = %other, "reservation failed");
            Value::String("error".to_string())
        }
    }
}

async fn execute(state: &AppState, command: Command) -> AppResult<Value> {
    let services = &state.services;
    match command {
        Command::BorrowBook(a) => {
            let message = services
                .lending
                .borrow(a.book_id, a.subscriber_id, a.librarian_id)
                .await?;
            Ok(Value::String(message))
        }
        Command::ReturnBook(a) => {
            let message = services
                .lending
                .return_book(a.book_id, a.subscriber_id, a.librarian_id, a.is_lost)
                .await?;
            Ok(Value::String(message))
        }
        Command::ExtendLoan(a) => {
            let message = services
                .lending
                .extend(a.subscriber_id, a.book_id, a.librarian_id)
                .await?;
            Ok(Value::String(message))
        }
        Command::ReserveBook(a) => {
            let outcome = services
                .reservations
                .request_reservation(a.subscriber_id, a.book_id)
                .await?;
            Ok(Value::String(outcome.wire_token().to_string()))
        }
        Command::CreateMember(m) => {
            let outcome = services
                .members
                .create_member(&m.full_name, m.email.as_deref(), m.phone.as_deref())
                .await?;
            match outcome {
                CreateMemberOutcome::Created(subscriber) => Ok(serde_json::to_value(subscriber)?),
                CreateMemberOutcome::DuplicatePhone => Ok(Value::String(
                    "A member with this phone already exists".to_string(),
                )),
            }
        }
        Command::UpdateMember(m) => {
            let message = services
                .members
                .update_member(
                    m.subscriber_id,
                    &m.full_name,
                    m.email.as_deref(),
                    m.phone.as_deref(),
                )
                .await?;
            Ok(Value::String(message))
        }
        Command::GetAllMembers => {
            let members = services.repository().subscribers.list_all().await?;
            Ok(serde_json::to_value(members)?)
        }
        Command::GetAllBooks => {
            let books = services.repository().books.list_all().await?;
            Ok(serde_json::to_value(books)?)
        }
        Command::GetBookById(book_id) => {
            let book = services.repository().books.get_by_id(book_id).await?;
            Ok(serde_json::to_value(book)?)
        }
        Command::GetBookByName(title) => {
            let rows = services.repository().books.search_by_title(&title).await?;
            Ok(serde_json::to_value(rows)?)
        }
        Command::GetBookByAuthor(author) => {
            let rows = services.repository().books.search_by_author(&author).await?;
            Ok(serde_json::to_value(rows)?)
        }
        Command::GetBookByTheme(subject) => {
            let rows = services.repository().books.search_by_subject(&subject).await?;
            Ok(serde_json::to_value(rows)?)
        }
        Command::GetBookByDescription(text) => {
            let rows = services
                .repository()
                .books
                .search_by_description(&text)
                .await?;
            Ok(serde_json::to_value(rows)?)
        }
        Command::GetActivityLogs => {
            let logs = services.repository().activity.list_all().await?;
            Ok(serde_json::to_value(logs)?)
        }
        Command::GetActivityLogsByMember(subscriber_id) => {
            let logs = services
                .repository()
                .activity
                .for_subscriber(subscriber_id)
                .await?;
            Ok(serde_json::to_value(logs)?)
        }
        Command::GetBorrowHistory(subscriber_id) => {
            let history = services.repository().loans.history_for(subscriber_id).await?;
            Ok(serde_json::to_value(history)?)
        }
        Command::GetNotifications(subscriber_id) => {
            let notifications = services.notifications.notifications_for(subscriber_id).await?;
            Ok(serde_json::to_value(notifications)?)
        }
        Command::DeleteNotifications(ids) => {
            let deleted = services.notifications.delete_notifications(&ids).await?;
            Ok(Value::Bool(deleted))
        }
        Command::GetLoanDurationChart(days) => {
            let snapshot = services
                .reports
                .get_or_generate(ReportKind::LoanDuration, days)
                .await?;
            Ok(serde_json::to_value(snapshot.payload)?)
        }
        Command::GetLateReturnChart(days) => {
            let snapshot = services
                .reports
                .get_or_generate(ReportKind::LateReturn, days)
                .await?;
            Ok(serde_json::to_value(snapshot.payload)?)
        }
        Command::GetMemberStatus(days) => {
            let snapshot = services
                .reports
                .get_or_generate(ReportKind::MemberStatus, days)
                .await?;
            Ok(serde_json::to_value(snapshot.payload)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_a_protocol_error() {
        let err = Command::parse("SelfDestruct", Value::Null).unwrap_err();
        match err {
            AppError::Protocol(msg) => assert!(msg.contains("SelfDestruct")),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[test]
    fn payload_shape_mismatch_is_a_protocol_error() {
        let err = Command::parse("BorrowBook", json!({"book_id": "three"})).unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
    }

    #[test]
    fn borrow_payload_parses() {
        let cmd = Command::parse(
            "BorrowBook",
            json!({"book_id": 3, "subscriber_id": 7, "librarian_id": 1}),
        )
        .unwrap();
        match cmd {
            Command::BorrowBook(a) => {
                assert_eq!((a.book_id, a.subscriber_id, a.librarian_id), (3, 7, 1));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn scalar_and_list_payloads_parse() {
        assert!(matches!(
            Command::parse("GetBookById", json!(12)).unwrap(),
            Command::GetBookById(12)
        ));
        match Command::parse("DeleteNotifications", json!([1, 2, 3])).unwrap() {
            Command::DeleteNotifications(ids) => assert_eq!(ids, vec![1, 2, 3]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn search_commands_take_a_string_payload() {
        match Command::parse("GetBookByName", json!("Dune")).unwrap() {
            Command::GetBookByName(title) => assert_eq!(title, "Dune"),
            other => panic!("unexpected command: {other:?}"),
        }
        match Command::parse("GetBookByAuthor", json!("Herbert")).unwrap() {
            Command::GetBookByAuthor(author) => assert_eq!(author, "Herbert"),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(matches!(
            Command::parse("GetBookByTheme", json!("Science Fiction")).unwrap(),
            Command::GetBookByTheme(_)
        ));
        let err = Command::parse("GetBookByDescription", json!(42)).unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));
    }

    #[test]
    fn create_member_requires_a_name() {
        let err = Command::parse("CreateMember", json!({"phone": "0501234567"})).unwrap_err();
        assert!(matches!(err, AppError::Protocol(_)));

        match Command::parse("CreateMember", json!({"full_name": "Ada Lovelace"})).unwrap() {
            Command::CreateMember(m) => {
                assert_eq!(m.full_name, "Ada Lovelace");
                assert_eq!(m.email, None);
                assert_eq!(m.phone, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn update_member_payload_parses() {
        let cmd = Command::parse(
            "UpdateMember",
            json!({
                "subscriber_id": 9,
                "full_name": "Ada King",
                "email": "ada@example.org"
            }),
        )
        .unwrap();
        match cmd {
            Command::UpdateMember(m) => {
                assert_eq!(m.subscriber_id, 9);
                assert_eq!(m.full_name, "Ada King");
                assert_eq!(m.email.as_deref(), Some("ada@example.org"));
                assert_eq!(m.phone, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parameterless_commands_ignore_payload() {
        assert!(matches!(
            Command::parse("GetAllBooks", Value::Null).unwrap(),
            Command::GetAllBooks
        ));
        assert!(matches!(
            Command::parse("GetActivityLogs", json!({"extra": true})).unwrap(),
            Command::GetActivityLogs
        ));
    }

    #[test]
    fn reserve_errors_map_to_tokens() {
        let db = AppError::Database(sqlx::Error::PoolClosed);
        assert_eq!(error_payload("ReserveBook", &db), json!("databaseerror"));
        let proto = AppError::Protocol("bad".to_string());
        assert_eq!(error_payload("ReserveBook", &proto), json!("error"));
    }

    #[test]
    fn other_errors_keep_their_message() {
        let err = AppError::Protocol("unknown command: Nope".to_string());
        let payload = error_payload("Nope", &err);
        assert_eq!(
            payload["error"],
            json!("Protocol error: unknown command: Nope")
        );
    }
}
