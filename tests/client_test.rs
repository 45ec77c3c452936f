mod common;

use std::{sync::Arc, time::Duration};

use common::{details, test_settings, TestEnv};
use medcamp::{
    api::create_app,
    auth::AuthService,
    client::{LifecycleClient, StaticToken},
    domain::{CreateRegistrationRequest, User},
    error::AppError,
    repository::IntentRepository,
};

async fn serve(env: &TestEnv) -> anyhow::Result<String> {
    let app = create_app(env.ctx.clone(), Arc::new(test_settings()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

async fn client_for(env: &TestEnv, base_url: &str, user: &User) -> anyhow::Result<LifecycleClient> {
    let auth: &AuthService = &env.ctx.auth_service;
    let (_, token) = auth.create_session(&user.email, 24).await?;
    Ok(LifecycleClient::with_timeout(
        base_url,
        Arc::new(StaticToken(token)),
        Duration::from_secs(5),
    )?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_drives_the_lifecycle() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let base_url = serve(&env).await?;
    let camp = env.camp(1000.0, Some(10)).await?;

    let participant = client_for(&env, &base_url, &env.participant).await?;
    let organizer = client_for(&env, &base_url, &env.organizer).await?;

    let registration = participant
        .submit_registration(&CreateRegistrationRequest {
            camp_id: camp.id,
            details: details(),
        })
        .await?;
    assert!(!registration.is_paid());

    let handle = participant.initiate_payment(registration.id).await?;
    let receipt = participant.confirm_payment(&handle, "pm_card_visa").await?;
    assert_eq!(receipt.amount_cents, 100_000);
    assert_eq!(receipt.registration_id, registration.id);

    let history = participant.payment_history().await?;
    assert_eq!(history, vec![receipt]);

    let err = participant.delete_registration(registration.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let stats = organizer.view_camp_stats(camp.id).await?;
    assert_eq!(stats.total_registrations, 1);
    assert_eq!(stats.paid_registrations, 1);
    assert_eq!(stats.unpaid_registrations, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_maps_domain_errors() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let base_url = serve(&env).await?;
    let camp = env.camp(300.0, Some(1)).await?;
    let other = env.user("other@example.com").await?;

    let first = client_for(&env, &base_url, &env.participant).await?;
    let second = client_for(&env, &base_url, &other).await?;
    let request = CreateRegistrationRequest {
        camp_id: camp.id,
        details: details(),
    };

    first.submit_registration(&request).await?;
    let err = second.submit_registration(&request).await.unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)));

    let err = second.view_camp_stats(camp.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn confirm_reconciles_a_charge_completed_elsewhere() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let base_url = serve(&env).await?;
    let camp = env.camp(1000.0, None).await?;

    let participant = client_for(&env, &base_url, &env.participant).await?;
    let registration = participant
        .submit_registration(&CreateRegistrationRequest {
            camp_id: camp.id,
            details: details(),
        })
        .await?;
    let handle = participant.initiate_payment(registration.id).await?;
    let record = env
        .ctx
        .intent_repo
        .find_by_id(handle.intent_id)
        .await?
        .expect("intent persisted");

    // The charge lands through the hosted page while the gateway API is flaky.
    env.gateway.succeed_out_of_band(&record.gateway_intent_id);
    env.gateway.fail_next_confirms(10);

    let receipt = participant.confirm_payment(&handle, "pm_card_visa").await?;
    assert_eq!(receipt.registration_id, registration.id);
    assert_eq!(receipt.transaction_id, record.gateway_intent_id);
    assert!(participant.get_registration(registration.id).await?.is_paid());
    Ok(())
}
