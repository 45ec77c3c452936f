mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use common::{test_settings, TestEnv, IDENTITY_SECRET, ORGANIZER_EMAIL, WEBHOOK_SECRET};
use medcamp::{
    api::create_app,
    auth::{sign_identity_token, IdentityClaims},
    payments::{FakeGateway, GatewayIntentStatus},
    repository::IntentRepository,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    app: Router,
    env: TestEnv,
}

impl Harness {
    async fn new() -> anyhow::Result<Self> {
        let env = TestEnv::new().await?;
        let app = create_app(env.ctx.clone(), Arc::new(test_settings()));
        Ok(Self { app, env })
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn sign_in(&self, email: &str, name: &str) -> anyhow::Result<String> {
        let claims = IdentityClaims {
            sub: format!("uid-{}", email),
            email: email.to_string(),
            name: Some(name.to_string()),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iss: None,
        };
        let id_token = sign_identity_token(IDENTITY_SECRET, &claims)?;

        let (status, body) = self
            .call(Method::POST, "/auth/session", None, Some(json!({ "id_token": id_token })))
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Ok(body["token"].as_str().unwrap_or_default().to_string())
    }

    async fn create_camp(&self, token: &str, fee: f64) -> anyhow::Result<String> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/camps",
                Some(token),
                Some(json!({
                    "name": "Pediatric Triage Camp",
                    "fee": fee,
                    "capacity": 30,
                    "scheduled_at": Utc::now() + Duration::days(14),
                    "location": "Chittagong",
                    "healthcare_professional": "Dr. Sultana",
                    "description": "Triage drills for children",
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Ok(body["id"].as_str().unwrap_or_default().to_string())
    }

    async fn register(&self, token: &str, camp_id: &str) -> anyhow::Result<String> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/registrations",
                Some(token),
                Some(json!({
                    "camp_id": camp_id,
                    "age": 31,
                    "phone": "+8801911000000",
                    "gender": "Male",
                    "emergency_contact": "Sadia, +8801611000000",
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Ok(body["id"].as_str().unwrap_or_default().to_string())
    }
}

#[tokio::test]
async fn health_is_public() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let (status, body) = h.call(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn forged_identity_token_is_rejected() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let claims = IdentityClaims {
        sub: "uid".to_string(),
        email: "mallory@example.com".to_string(),
        name: None,
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
        iss: None,
    };
    let forged = sign_identity_token("some-other-secret", &claims)?;

    let (status, body) = h
        .call(Method::POST, "/auth/session", None, Some(json!({ "id_token": forged })))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_session() -> anyhow::Result<()> {
    let h = Harness::new().await?;

    let (status, body) = h.call(Method::GET, "/api/registrations/mine", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = h
        .call(Method::GET, "/api/registrations/mine", Some("not-a-session"), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Listing camps stays public.
    let (status, body) = h.call(Method::GET, "/api/camps", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().is_some());
    Ok(())
}

#[tokio::test]
async fn participants_cannot_manage_camps() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let token = h.sign_in("nadia@example.com", "Nadia Islam").await?;

    let (status, body) = h
        .call(Method::POST, "/api/camps", Some(&token), Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
    Ok(())
}

#[tokio::test]
async fn full_lifecycle_over_http() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let organizer = h.sign_in(ORGANIZER_EMAIL, "Dr. Organizer").await?;
    let participant = h.sign_in("rafi@example.com", "Rafi Ahmed").await?;

    let camp_id = h.create_camp(&organizer, 1000.0).await?;
    let registration_id = h.register(&participant, &camp_id).await?;

    let (status, camp) = h
        .call(Method::GET, &format!("/api/camps/{}", camp_id), None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(camp["participant_count"], 1);
    assert_eq!(camp["fee_cents"], 100_000);

    let (status, handle) = h
        .call(
            Method::POST,
            "/api/payments/intents",
            Some(&participant),
            Some(json!({ "registration_id": registration_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{handle}");
    assert_eq!(handle["amount_cents"], 100_000);
    let intent_id = handle["intent_id"].as_str().unwrap_or_default().to_string();

    let (status, receipt) = h
        .call(
            Method::POST,
            &format!("/api/payments/intents/{}/confirm", intent_id),
            Some(&participant),
            Some(json!({ "payment_method": "pm_card_visa" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{receipt}");
    assert_eq!(receipt["amount"], 1000.0);
    assert_eq!(receipt["registration_id"], registration_id.as_str());

    let (status, registration) = h
        .call(
            Method::GET,
            &format!("/api/registrations/{}", registration_id),
            Some(&participant),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registration["payment_status"], "paid");

    let (status, body) = h
        .call(
            Method::DELETE,
            &format!("/api/registrations/{}", registration_id),
            Some(&participant),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");

    let (status, stats) = h
        .call(
            Method::GET,
            &format!("/api/stats/camps/{}", camp_id),
            Some(&organizer),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_registrations"], 1);
    assert_eq!(stats["paid_registrations"], 1);
    assert_eq!(stats["unpaid_registrations"], 0);

    let (status, history) = h
        .call(Method::GET, "/api/payments/mine", Some(&participant), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn other_participants_cannot_see_a_registration() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let organizer = h.sign_in(ORGANIZER_EMAIL, "Dr. Organizer").await?;
    let owner = h.sign_in("rafi@example.com", "Rafi Ahmed").await?;
    let stranger = h.sign_in("stranger@example.com", "Stranger").await?;

    let camp_id = h.create_camp(&organizer, 500.0).await?;
    let registration_id = h.register(&owner, &camp_id).await?;

    let (status, _) = h
        .call(
            Method::GET,
            &format!("/api/registrations/{}", registration_id),
            Some(&stranger),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .call(
            Method::DELETE,
            &format!("/api/registrations/{}", registration_id),
            Some(&owner),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn webhook_settles_registration() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let organizer = h.sign_in(ORGANIZER_EMAIL, "Dr. Organizer").await?;
    let participant = h.sign_in("rafi@example.com", "Rafi Ahmed").await?;
    let camp_id = h.create_camp(&organizer, 250.0).await?;
    let registration_id = h.register(&participant, &camp_id).await?;

    let (_, handle) = h
        .call(
            Method::POST,
            "/api/payments/intents",
            Some(&participant),
            Some(json!({ "registration_id": registration_id })),
        )
        .await?;
    let intent_id = handle["intent_id"].as_str().unwrap_or_default().parse()?;
    let record = h
        .env
        .ctx
        .intent_repo
        .find_by_id(intent_id)
        .await?
        .expect("intent persisted");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .header("stripe-signature", WEBHOOK_SECRET)
        .body(Body::from(FakeGateway::webhook_payload(&record.gateway_intent_id)))?;
    let response = h.app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let unsigned = Request::builder()
        .method(Method::POST)
        .uri("/api/payments/webhook")
        .body(Body::from(FakeGateway::webhook_payload(&record.gateway_intent_id)))?;
    let response = h.app.clone().oneshot(unsigned).await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (_, registration) = h
        .call(
            Method::GET,
            &format!("/api/registrations/{}", registration_id),
            Some(&participant),
            None,
        )
        .await?;
    assert_eq!(registration["payment_status"], "paid");
    Ok(())
}

#[tokio::test]
async fn sign_out_invalidates_the_session() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let token = h.sign_in("rafi@example.com", "Rafi Ahmed").await?;

    let (status, _) = h.call(Method::DELETE, "/auth/session", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .call(Method::GET, "/api/registrations/mine", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn null_capacity_makes_a_camp_unlimited() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let organizer = h.sign_in(ORGANIZER_EMAIL, "Dr. Organizer").await?;
    let camp_id = h.create_camp(&organizer, 500.0).await?;

    let (status, camp) = h
        .call(
            Method::PUT,
            &format!("/api/camps/{}", camp_id),
            Some(&organizer),
            Some(json!({ "capacity": null })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{camp}");
    assert_eq!(camp["capacity"], Value::Null);
    assert_eq!(camp["seats_remaining"], Value::Null);

    let (status, camp) = h
        .call(
            Method::PUT,
            &format!("/api/camps/{}", camp_id),
            Some(&organizer),
            Some(json!({ "location": "Sylhet" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{camp}");
    assert_eq!(camp["capacity"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn deleting_a_registration_cancels_its_payment() -> anyhow::Result<()> {
    let h = Harness::new().await?;
    let organizer = h.sign_in(ORGANIZER_EMAIL, "Dr. Organizer").await?;
    let participant = h.sign_in("rafi@example.com", "Rafi Ahmed").await?;
    let camp_id = h.create_camp(&organizer, 1000.0).await?;
    let registration_id = h.register(&participant, &camp_id).await?;

    let (status, handle) = h
        .call(
            Method::POST,
            "/api/payments/intents",
            Some(&participant),
            Some(json!({ "registration_id": registration_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{handle}");
    let intent_id = handle["intent_id"].as_str().unwrap_or_default().parse()?;
    let record = h
        .env
        .ctx
        .intent_repo
        .find_by_id(intent_id)
        .await?
        .expect("intent persisted");

    let (status, _) = h
        .call(
            Method::DELETE,
            &format!("/api/registrations/{}", registration_id),
            Some(&participant),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        h.env.gateway.intent(&record.gateway_intent_id).map(|i| i.status),
        Some(GatewayIntentStatus::Canceled)
    );
    assert!(h.env.gateway.succeed_out_of_band(&record.gateway_intent_id).is_none());
    Ok(())
}
