use axum::http::Uri;
use axum::{Json, Router};
use hh_vacancy_bot::bot::api::TelegramApi;
use hh_vacancy_bot::bot::types::InlineKeyboardMarkup;
use serde_json::{json, Value};

/// Stub Telegram server answering every bot method from a canned map.
/// Uses a fallback handler because the real method URLs embed `bot<token>`.
async fn spawn_telegram_stub() -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new().fallback(
        |uri: Uri, Json(body): Json<Value>| async move {
            let method = uri.path().rsplit('/').next().unwrap_or("").to_string();
            let response = match method.as_str() {
                "getUpdates" => {
                    assert!(body.get("timeout").is_some());
                    json!({
                        "ok": true,
                        "result": [{
                            "update_id": 100,
                            "message": {
                                "message_id": 1,
                                "from": {"id": 42, "first_name": "Ira"},
                                "chat": {"id": 42},
                                "text": "/start"
                            }
                        }]
                    })
                }
                "sendMessage" => {
                    if body["chat_id"] == json!(0) {
                        json!({"ok": false, "description": "Bad Request: chat not found"})
                    } else {
                        json!({
                            "ok": true,
                            "result": {"message_id": 2, "chat": {"id": 42}}
                        })
                    }
                }
                "editMessageText" => json!({"ok": true, "result": true}),
                "answerCallbackQuery" => json!({"ok": true, "result": true}),
                _ => json!({"ok": false, "description": format!("unknown method {method}")}),
            };
            Json(response)
        },
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind telegram stub");
    let addr = listener.local_addr().expect("stub addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("telegram stub");
    });
    (format!("http://{addr}"), task)
}

#[tokio::test(flavor = "multi_thread")]
async fn get_updates_unwraps_the_envelope() {
    let (base, task) = spawn_telegram_stub().await;
    let api = TelegramApi::new(&base, "123:abc").expect("api");

    let updates = api.get_updates(0, 1).await.expect("updates");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_id, 100);
    let message = updates[0].message.as_ref().expect("message");
    assert_eq!(message.text.as_deref(), Some("/start"));
    task.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn send_message_round_trips_with_keyboard() {
    let (base, task) = spawn_telegram_stub().await;
    let api = TelegramApi::new(&base, "123:abc").expect("api");

    let markup = InlineKeyboardMarkup::default();
    let message = api
        .send_message(42, "Главное меню", Some(&markup))
        .await
        .expect("send");
    assert_eq!(message.message_id, 2);

    api.edit_message_text(42, 2, "upd", None).await.expect("edit");
    api.answer_callback_query("cb-1").await.expect("answer");
    task.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_method_surfaces_description_without_token() {
    let (base, task) = spawn_telegram_stub().await;
    let api = TelegramApi::new(&base, "123:abc").expect("api");

    let err = api.send_message(0, "x", None).await.expect_err("rejected");
    let text = err.to_string();
    assert!(text.contains("TELEGRAM_API_ERROR"));
    assert!(text.contains("chat not found"));
    assert!(!text.contains("123:abc"), "token must not leak: {text}");
    task.abort();
}
