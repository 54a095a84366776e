use std::time::Duration;

use secrecy::Secret;
use wiremock::matchers::any;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use crate::helpers::form_with;
use crate::helpers::form_without;
use crate::helpers::json_body;
use crate::helpers::spawn_app;
use crate::helpers::spawn_app_with;
use crate::helpers::valid_form;

fn field<'a>(
    form: &'a [(&str, String)],
    key: &str,
) -> &'a str {
    form.iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.as_str())
        .unwrap()
}

#[tokio::test]
async fn submit_ok() {
    let app = spawn_app().await;
    app.expect_emails(1).await;

    let resp = app.post_form(&valid_form()).await;

    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(json_body(resp).await, serde_json::json!({ "ok": true }));
}

/// What was typed must arrive in the email unmodified
#[tokio::test]
async fn email_carries_submission() {
    let app = spawn_app().await;
    app.expect_emails(1).await;
    let form = valid_form();

    app.post_form(&form).await.error_for_status().unwrap();

    let emails = app.sent_emails().await;
    let email = &emails[0];
    let text = email["text"].as_str().unwrap();
    for key in ["name", "email", "message"] {
        assert!(text.contains(field(&form, key)), "{key} missing from body");
    }
    assert!(text.contains("Phone: 555-0100"));
    assert!(text.contains("Request type: Sales"));
    assert_eq!(email["reply_to"], field(&form, "email"));

    let subject = email["subject"].as_str().unwrap();
    assert!(subject.contains("Sales"));
    assert!(subject.contains(field(&form, "name")));
}

#[tokio::test]
async fn missing_phone_uses_placeholder() {
    let app = spawn_app().await;
    app.expect_emails(1).await;

    app.post_form(&form_without(&["phone"]))
        .await
        .error_for_status()
        .unwrap();

    let emails = app.sent_emails().await;
    assert!(emails[0]["text"]
        .as_str()
        .unwrap()
        .contains("Phone: (not provided)"));
}

#[tokio::test]
async fn surrounding_whitespace_is_trimmed() {
    let app = spawn_app().await;
    app.expect_emails(1).await;

    app.post_form(&form_with(&[
        ("name", "   Jane Doe  "),
        ("email", " jane@example.com\n"),
    ]))
    .await
    .error_for_status()
    .unwrap();

    let emails = app.sent_emails().await;
    assert_eq!(emails[0]["reply_to"], "jane@example.com");
    assert!(emails[0]["text"]
        .as_str()
        .unwrap()
        .contains("Name: Jane Doe\n"));
}

#[tokio::test]
async fn non_ascii_text_survives() {
    let app = spawn_app().await;
    app.expect_emails(1).await;
    let message = "Grüße aus Köln! 東京でお会いしましょう ✓\n\nZweite Zeile & mehr = 100%";

    app.post_form(&form_with(&[("name", "Zoë Ångström"), ("message", message)]))
        .await
        .error_for_status()
        .unwrap();

    let emails = app.sent_emails().await;
    let text = emails[0]["text"].as_str().unwrap();
    assert!(text.contains("Zoë Ångström"));
    assert!(text.contains(message));
}

/// Bots get the same answer as humans, and nothing else happens
#[tokio::test]
async fn honeypot_is_silently_accepted() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    for form in [
        form_with(&[("company", "ACME Corp")]),
        // even an otherwise invalid form
        vec![("company", "ACME Corp".to_string())],
        form_with(&[("company", "x"), ("request_type", "Nope")]),
    ] {
        let resp = app.post_form(&form).await;
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(json_body(resp).await, serde_json::json!({ "ok": true }));
    }
}

#[tokio::test]
async fn blank_honeypot_is_ignored() {
    let app = spawn_app().await;
    app.expect_emails(1).await;

    let resp = app.post_form(&form_with(&[("company", "   ")])).await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn missing_required_fields() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    for (form, msg) in [
        (vec![], "empty form"),
        (form_without(&["name"]), "no name"),
        (form_without(&["email"]), "no email"),
        (form_without(&["message"]), "no message"),
        (form_with(&[("name", "")]), "empty name"),
        (form_with(&[("email", "  ")]), "blank email"),
        (form_with(&[("message", "\n\t")]), "blank message"),
        (
            form_with(&[("name", ""), ("request_type", "Nope")]),
            "no name, bad type",
        ),
    ] {
        let resp = app.post_form(&form).await;
        assert_eq!(resp.status().as_u16(), 400, "{msg}");
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({ "error": "Missing required fields." }),
            "{msg}"
        );
    }
}

#[tokio::test]
async fn invalid_request_type() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    for (form, msg) in [
        (form_without(&["request_type"]), "absent"),
        (form_with(&[("request_type", "")]), "empty"),
        (form_with(&[("request_type", "sales")]), "wrong case"),
        (form_with(&[("request_type", "Refund")]), "unknown"),
    ] {
        let resp = app.post_form(&form).await;
        assert_eq!(resp.status().as_u16(), 400, "{msg}");
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({ "error": "Invalid request type." }),
            "{msg}"
        );
    }
}

#[tokio::test]
async fn malformed_body_is_generic_400() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/appointment", app.addr))
        .json(&serde_json::json!({ "name": "Jane" }))
        .send()
        .await
        .expect("execute request");

    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(
        json_body(resp).await,
        serde_json::json!({ "error": "Bad request." })
    );
}

#[tokio::test]
async fn relay_failure_is_502() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let resp = app.post_form(&valid_form()).await;

    assert_eq!(resp.status().as_u16(), 502);
    assert_eq!(
        json_body(resp).await,
        serde_json::json!({ "error": "Email failed. Please try again later." })
    );
}

#[tokio::test]
async fn relay_timeout_is_502() {
    let app = spawn_app_with(|cfg| cfg.email_client.timeout_milliseconds = 200).await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let resp = app.post_form(&valid_form()).await;
    assert_eq!(resp.status().as_u16(), 502);
}

#[tokio::test]
async fn missing_api_key_is_500() {
    for token in [None, Some(Secret::new(String::new()))] {
        let app = spawn_app_with(|cfg| cfg.email_client.authorization_token = token).await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&app.email_server)
            .await;

        let resp = app.post_form(&valid_form()).await;

        assert_eq!(resp.status().as_u16(), 500);
        assert_eq!(
            json_body(resp).await,
            serde_json::json!({ "error": "Missing RESEND_API_KEY." })
        );
    }
}

/// Long messages are relayed in full, not rejected by a body size limit
#[tokio::test]
async fn long_message_is_accepted() {
    let app = spawn_app().await;
    app.expect_emails(1).await;
    let message = "a".repeat(20_000);

    let resp = app.post_form(&form_with(&[("message", message.as_str())])).await;
    assert_eq!(resp.status().as_u16(), 200);

    let emails = app.sent_emails().await;
    assert!(emails[0]["text"].as_str().unwrap().contains(&message));
}

#[tokio::test]
async fn multipart_submission_ok() {
    let app = spawn_app().await;
    app.expect_emails(1).await;
    let form = form_with(&[("message", "Line one\r\nLine two & more")]);

    let resp = app.post_multipart(&form).await;

    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(json_body(resp).await, serde_json::json!({ "ok": true }));

    let emails = app.sent_emails().await;
    let text = emails[0]["text"].as_str().unwrap();
    assert!(text.contains(field(&form, "name")));
    assert!(text.contains("Line one\r\nLine two & more"));
    assert!(text.contains("Phone: 555-0100"));
    assert_eq!(emails[0]["reply_to"], field(&form, "email"));
}

#[tokio::test]
async fn multipart_long_message_is_accepted() {
    let app = spawn_app().await;
    app.expect_emails(1).await;

    let resp = app
        .post_multipart(&form_with(&[("message", "b".repeat(20_000).as_str())]))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn multipart_is_validated_like_urlencoded() {
    let app = spawn_app().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let resp = app.post_multipart(&form_without(&["name"])).await;
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(
        json_body(resp).await,
        serde_json::json!({ "error": "Missing required fields." })
    );

    let resp = app
        .post_multipart(&form_with(&[("request_type", "Refund")]))
        .await;
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(
        json_body(resp).await,
        serde_json::json!({ "error": "Invalid request type." })
    );

    let resp = app
        .post_multipart(&form_with(&[("company", "ACME Corp")]))
        .await;
    assert_eq!(resp.status().as_u16(), 200);
}
