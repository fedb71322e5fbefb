//! Adapter protocol tests against a mock provider
//!
//! Each adapter talks to a wiremock server standing in for its platform API,
//! verifying the exact payloads sent, the URLs derived from responses, and
//! the polling bounds of the asynchronous publish protocol.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use libomnicast::credentials::{
    FacebookCredentials, InstagramCredentials, TelegramCredentials, WhatsappCredentials,
    XCredentials,
};
use libomnicast::platforms::facebook::FacebookAdapter;
use libomnicast::platforms::instagram::InstagramAdapter;
use libomnicast::platforms::telegram::TelegramAdapter;
use libomnicast::platforms::whatsapp::WhatsappAdapter;
use libomnicast::platforms::x::XAdapter;
use libomnicast::platforms::{PlatformAdapter, PublishContent};
use libomnicast::types::MediaType;
use libomnicast::{OmnicastError, PlatformError};

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn telegram(server: &MockServer) -> TelegramAdapter {
    TelegramAdapter::with_api_base(
        TelegramCredentials {
            bot_token: "123456:abc".to_string(),
            channel_id: "@launches".to_string(),
        },
        http(),
        &server.uri(),
    )
}

fn instagram(server: &MockServer) -> InstagramAdapter {
    InstagramAdapter::with_api_base(
        InstagramCredentials {
            access_token: "ig-token".to_string(),
            instagram_user_id: "17841400".to_string(),
        },
        http(),
        &server.uri(),
    )
    .with_polling(Duration::from_millis(5), 8)
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

#[tokio::test]
async fn telegram_publish_composes_caption_and_hashtags() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123456:abc/sendMessage"))
        .and(body_string_contains("Hello\\n\\n#launch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 42, "chat": { "username": "launches" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = telegram(&server)
        .publish(&PublishContent::text("Hello", vec!["launch".to_string()]))
        .await
        .unwrap();

    assert_eq!(outcome.post_url.as_deref(), Some("https://t.me/launches/42"));
}

#[tokio::test]
async fn telegram_media_publish_goes_through_send_photo() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123456:abc/sendPhoto"))
        .and(body_string_contains("cdn.example.com/pic.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "message_id": 7, "chat": { "username": "launches" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = telegram(&server)
        .publish(&PublishContent {
            caption: "Look".to_string(),
            hashtags: vec![],
            media_url: Some("https://cdn.example.com/pic.jpg".to_string()),
            media_type: Some(MediaType::Image),
        })
        .await
        .unwrap();

    assert_eq!(outcome.post_url.as_deref(), Some("https://t.me/launches/7"));
}

#[tokio::test]
async fn telegram_test_reports_bot_identity() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123456:abc/getMe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": { "username": "launch_bot", "first_name": "Launcher" }
        })))
        .mount(&server)
        .await;

    let outcome = telegram(&server).test().await.unwrap();
    assert_eq!(outcome.info, "Bot @launch_bot (Launcher)");
}

#[tokio::test]
async fn telegram_provider_error_passes_description_through() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bot123456:abc/getMe"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        })))
        .mount(&server)
        .await;

    let err = telegram(&server).test().await.unwrap_err();
    match err {
        OmnicastError::Platform(PlatformError::Provider(msg)) => {
            assert!(msg.contains("Unauthorized"));
        }
        other => panic!("Expected provider error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// WhatsApp
// ---------------------------------------------------------------------------

#[tokio::test]
async fn whatsapp_publish_sends_cloud_api_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/1055501234/messages"))
        .and(body_string_contains("\"messaging_product\":\"whatsapp\""))
        .and(body_string_contains("Hello\\n\\n#launch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{ "id": "wamid.123" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = WhatsappAdapter::with_api_base(
        WhatsappCredentials {
            access_token: "EAAB".to_string(),
            phone_number_id: "1055501234".to_string(),
            recipient_phone: "+15550001111".to_string(),
        },
        http(),
        &server.uri(),
    );

    let outcome = adapter
        .publish(&PublishContent::text("Hello", vec!["launch".to_string()]))
        .await
        .unwrap();

    // Message delivery has no public URL
    assert!(outcome.post_url.is_none());
}

// ---------------------------------------------------------------------------
// Facebook
// ---------------------------------------------------------------------------

#[tokio::test]
async fn facebook_feed_post_derives_url_from_composite_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/1784000/feed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "1784000_9921733" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let adapter = FacebookAdapter::with_api_base(
        FacebookCredentials {
            page_access_token: "page-token".to_string(),
            page_id: "1784000".to_string(),
        },
        http(),
        &server.uri(),
    );

    let outcome = adapter
        .publish(&PublishContent::text("Big news", vec![]))
        .await
        .unwrap();

    assert_eq!(
        outcome.post_url.as_deref(),
        Some("https://www.facebook.com/1784000/posts/9921733")
    );
}

#[tokio::test]
async fn facebook_engagement_resolves_post_from_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/1784000_9921733"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reactions": { "summary": { "total_count": 12 } },
            "comments": { "summary": { "total_count": 3 } },
            "shares": { "count": 2 }
        })))
        .mount(&server)
        .await;

    let adapter = FacebookAdapter::with_api_base(
        FacebookCredentials {
            page_access_token: "page-token".to_string(),
            page_id: "1784000".to_string(),
        },
        http(),
        &server.uri(),
    );

    let metrics = adapter
        .fetch_engagement(Some("https://www.facebook.com/1784000/posts/9921733"))
        .await
        .unwrap();

    assert_eq!(metrics.likes, 12);
    assert_eq!(metrics.comments, 3);
    assert_eq!(metrics.shares, 2);
    assert_eq!(metrics.reach, 0);
}

// ---------------------------------------------------------------------------
// Instagram: two-step async publish
// ---------------------------------------------------------------------------

#[tokio::test]
async fn instagram_image_publish_skips_polling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/17841400/media"))
        .and(body_string_contains("image_url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "container-1" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/17841400/media_publish"))
        .and(body_string_contains("container-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-9" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/media-9"))
        .and(query_param("fields", "permalink"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "permalink": "https://www.instagram.com/p/Cxyz123/"
        })))
        .mount(&server)
        .await;

    let outcome = instagram(&server)
        .publish(&PublishContent {
            caption: "Sunset".to_string(),
            hashtags: vec!["nofilter".to_string()],
            media_url: Some("https://cdn.example.com/sunset.jpg".to_string()),
            media_type: Some(MediaType::Image),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome.post_url.as_deref(),
        Some("https://www.instagram.com/p/Cxyz123/")
    );

    // No status poll happened for an image
    let status_polls = status_poll_count(&server, "container-1").await;
    assert_eq!(status_polls, 0);
}

#[tokio::test]
async fn instagram_video_publish_polls_until_finished() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/17841400/media"))
        .and(body_string_contains("video_url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "container-2" })))
        .mount(&server)
        .await;

    // Two in-progress polls, then finished on the third
    Mock::given(method("GET"))
        .and(path("/container-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status_code": "IN_PROGRESS" })),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/container-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status_code": "FINISHED" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/17841400/media_publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-10" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/media-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "permalink": "https://www.instagram.com/reel/Cabc987/"
        })))
        .mount(&server)
        .await;

    let outcome = instagram(&server)
        .publish(&PublishContent {
            caption: "Clip".to_string(),
            hashtags: vec![],
            media_url: Some("https://cdn.example.com/clip.mp4".to_string()),
            media_type: Some(MediaType::Video),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome.post_url.as_deref(),
        Some("https://www.instagram.com/reel/Cabc987/")
    );

    // Finished on poll 3: no further polling
    let status_polls = status_poll_count(&server, "container-2").await;
    assert_eq!(status_polls, 3);
}

#[tokio::test]
async fn instagram_video_publish_times_out_after_poll_ceiling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/17841400/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "container-3" })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/container-3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status_code": "IN_PROGRESS" })),
        )
        .mount(&server)
        .await;

    let err = instagram(&server)
        .publish(&PublishContent {
            caption: "Clip".to_string(),
            hashtags: vec![],
            media_url: Some("https://cdn.example.com/clip.mp4".to_string()),
            media_type: Some(MediaType::Video),
        })
        .await
        .unwrap_err();

    match err {
        OmnicastError::Platform(PlatformError::MediaProcessing(msg)) => {
            assert!(msg.contains("did not finish"));
        }
        other => panic!("Expected media-processing timeout, got {other:?}"),
    }

    // Exactly the poll ceiling, no more
    let status_polls = status_poll_count(&server, "container-3").await;
    assert_eq!(status_polls, 8);
}

#[tokio::test]
async fn instagram_video_publish_fails_fast_on_error_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/17841400/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "container-4" })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/container-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status_code": "ERROR" })))
        .mount(&server)
        .await;

    let err = instagram(&server)
        .publish(&PublishContent {
            caption: "Clip".to_string(),
            hashtags: vec![],
            media_url: Some("https://cdn.example.com/clip.mp4".to_string()),
            media_type: Some(MediaType::Video),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OmnicastError::Platform(PlatformError::MediaProcessing(_))
    ));

    // Failed on the first terminal answer
    let status_polls = status_poll_count(&server, "container-4").await;
    assert_eq!(status_polls, 1);
}

#[tokio::test]
async fn instagram_permalink_failure_is_non_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/17841400/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "container-5" })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/17841400/media_publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "media-11" })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/media-11"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outcome = instagram(&server)
        .publish(&PublishContent {
            caption: "Sunset".to_string(),
            hashtags: vec![],
            media_url: Some("https://cdn.example.com/sunset.jpg".to_string()),
            media_type: Some(MediaType::Image),
        })
        .await
        .unwrap();

    // Publish succeeded, only the URL is missing
    assert!(outcome.post_url.is_none());
}

#[tokio::test]
async fn instagram_engagement_aggregates_recent_media() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/17841400/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "like_count": 10, "comments_count": 2 },
                { "like_count": 5, "comments_count": 1 },
                { "like_count": 7 }
            ]
        })))
        .mount(&server)
        .await;

    let metrics = instagram(&server)
        .fetch_engagement(Some("https://www.instagram.com/p/Cxyz123/"))
        .await
        .unwrap();

    assert_eq!(metrics.likes, 22);
    assert_eq!(metrics.comments, 3);
}

// ---------------------------------------------------------------------------
// X
// ---------------------------------------------------------------------------

#[tokio::test]
async fn x_publish_sends_signed_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_string_contains("Hello\\n\\n#launch"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": { "id": "1585841080431321088", "text": "Hello" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = XAdapter::with_api_base(
        XCredentials {
            api_key: "ck".to_string(),
            api_secret: "cs".to_string(),
            access_token: "at".to_string(),
            access_token_secret: "ats".to_string(),
        },
        http(),
        &server.uri(),
    );

    let outcome = adapter
        .publish(&PublishContent::text("Hello", vec!["launch".to_string()]))
        .await
        .unwrap();

    assert_eq!(
        outcome.post_url.as_deref(),
        Some("https://x.com/i/web/status/1585841080431321088")
    );

    // Every request carried an OAuth 1.0a authorization header
    let requests = server.received_requests().await.unwrap();
    let auth = requests[0]
        .headers
        .get("authorization")
        .expect("authorization header")
        .to_str()
        .unwrap();
    assert!(auth.starts_with("OAuth "));
    assert!(auth.contains("oauth_consumer_key=\"ck\""));
    assert!(auth.contains("oauth_signature_method=\"HMAC-SHA1\""));
    assert!(auth.contains("oauth_signature=\""));
}

#[tokio::test]
async fn x_engagement_maps_public_metrics() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2/tweets/1585841080431321088"))
        .and(query_param("tweet.fields", "public_metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "1585841080431321088",
                "public_metrics": {
                    "like_count": 100,
                    "reply_count": 20,
                    "retweet_count": 30,
                    "quote_count": 5,
                    "impression_count": 9000
                }
            }
        })))
        .mount(&server)
        .await;

    let adapter = XAdapter::with_api_base(
        XCredentials {
            api_key: "ck".to_string(),
            api_secret: "cs".to_string(),
            access_token: "at".to_string(),
            access_token_secret: "ats".to_string(),
        },
        http(),
        &server.uri(),
    );

    let metrics = adapter
        .fetch_engagement(Some("https://x.com/i/web/status/1585841080431321088"))
        .await
        .unwrap();

    assert_eq!(metrics.likes, 100);
    assert_eq!(metrics.comments, 20);
    assert_eq!(metrics.shares, 35);
    assert_eq!(metrics.reach, 9000);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn status_poll_count(server: &MockServer, container_id: &str) -> usize {
    let wanted = format!("/{container_id}");
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r: &&Request| r.method.as_str() == "GET" && r.url.path() == wanted)
        .count()
}
