// tests/telegram_sink.rs
mod common;

use common::{TelegramMock, BOT_TOKEN, CHAT_ID};
use fin_briefing::deliver::{Format, Message, Sink, TelegramSink};
use fin_briefing::DeliveryError;
use http::StatusCode;
use serde_json::json;

fn sink(base: String) -> TelegramSink {
    TelegramSink::new(base, Some(BOT_TOKEN.into()), Some(CHAT_ID.into())).with_timeout(5)
}

#[tokio::test]
async fn plain_message_is_sent_once() {
    let mock = TelegramMock::default();
    let base = mock.start().await;

    sink(base)
        .deliver(&Message::plain("[005930] 삼성전자", "영업이익 잠정"))
        .await
        .unwrap();

    let sent = mock.received();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["text"], "[005930] 삼성전자\n\n영업이익 잠정");
    assert_eq!(sent[0]["disable_web_page_preview"], true);
    assert!(sent[0].get("parse_mode").is_none());
}

#[tokio::test]
async fn rate_limit_is_retried_after_the_advertised_wait() {
    let mock = TelegramMock::default().respond(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "ok": false, "description": "Too Many Requests: retry after 0", "parameters": { "retry_after": 0 } }),
    );
    let base = mock.start().await;

    sink(base).deliver(&Message::plain("", "hello")).await.unwrap();
    assert_eq!(mock.received().len(), 2);
}

#[tokio::test]
async fn rate_limit_gives_up_after_the_retry_budget() {
    let limited = json!({ "ok": false, "description": "Too Many Requests", "parameters": { "retry_after": 0 } });
    let mock = TelegramMock::default()
        .respond(StatusCode::TOO_MANY_REQUESTS, limited.clone())
        .respond(StatusCode::TOO_MANY_REQUESTS, limited);
    let base = mock.start().await;

    let err = sink(base)
        .with_retries(2)
        .deliver(&Message::plain("", "hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { sink: "telegram", .. }));
    assert_eq!(mock.received().len(), 2);
}

#[tokio::test]
async fn rejected_markdown_is_resent_as_plain_text() {
    let mock = TelegramMock::default().respond(
        StatusCode::BAD_REQUEST,
        json!({ "ok": false, "description": "Bad Request: can't parse entities" }),
    );
    let base = mock.start().await;

    let msg = Message::new("", "📊 *넷마블 4Q25 call summary*\n\n_unbalanced", Format::Markdown);
    sink(base).deliver(&msg).await.unwrap();

    let sent = mock.received();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["parse_mode"], "Markdown");
    assert!(sent[1].get("parse_mode").is_none());
    assert_eq!(sent[0]["text"], sent[1]["text"]);
}

#[tokio::test]
async fn other_rejections_surface_the_api_description() {
    let mock = TelegramMock::default().respond(
        StatusCode::FORBIDDEN,
        json!({ "ok": false, "description": "Forbidden: bot was blocked by the user" }),
    );
    let base = mock.start().await;

    let err = sink(base)
        .deliver(&Message::new("", "<b>x</b>", Format::Html))
        .await
        .unwrap_err();
    match err {
        DeliveryError::Rejected { description, .. } => {
            assert_eq!(description, "Forbidden: bot was blocked by the user")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(mock.received().len(), 1);
}

#[tokio::test]
async fn unreachable_api_is_a_network_error() {
    let err = sink("http://127.0.0.1:1".into())
        .deliver(&Message::plain("", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Network { sink: "telegram", .. }));
}

#[tokio::test]
async fn link_preview_can_be_enabled() {
    let mock = TelegramMock::default();
    let base = mock.start().await;

    sink(base)
        .with_link_preview(true)
        .deliver(&Message::plain("", "https://kind.krx.co.kr/"))
        .await
        .unwrap();
    assert_eq!(mock.received()[0]["disable_web_page_preview"], false);
}

#[tokio::test]
async fn missing_chat_id_fails_before_any_request() {
    let mock = TelegramMock::default();
    let base = mock.start().await;

    let err = TelegramSink::new(base, Some(BOT_TOKEN.into()), None)
        .deliver(&Message::plain("", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::MissingCredential("CHAT_ID")));
    assert!(mock.received().is_empty());
}
