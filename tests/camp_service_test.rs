mod common;

use common::{camp_request, details, participant_of, TestEnv, ORGANIZER_EMAIL};
use medcamp::{
    domain::{CreateFeedbackRequest, PaymentReceipt, Role, UpdateCampRequest},
    error::AppError,
};

#[tokio::test]
async fn fee_is_stored_in_minor_units() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let camp = env.camp(1000.0, Some(25)).await?;

    assert_eq!(camp.fee_cents, 100_000);
    assert_eq!(camp.fee(), 1000.0);
    assert_eq!(camp.created_by, ORGANIZER_EMAIL);
    assert_eq!(camp.seats_remaining(), Some(25));
    Ok(())
}

#[tokio::test]
async fn participants_cannot_create_camps() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let err = env
        .ctx
        .camp_service
        .create_camp(&env.participant, camp_request(100.0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn negative_fee_and_past_date_are_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let service = &env.ctx.camp_service;

    let err = service
        .create_camp(&env.organizer, camp_request(-5.0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut past = camp_request(100.0, None);
    past.scheduled_at = chrono::Utc::now() - chrono::Duration::days(1);
    let err = service.create_camp(&env.organizer, past).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn capacity_cannot_drop_below_registrations() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let camp = env.camp(200.0, Some(5)).await?;
    let other = env.user("other@example.com").await?;
    for user in [&env.participant, &other] {
        env.ctx
            .ledger
            .create_registration(camp.id, participant_of(user), details())
            .await?;
    }

    let shrink = |capacity| UpdateCampRequest {
        capacity: Some(Some(capacity)),
        ..Default::default()
    };

    let err = env
        .ctx
        .camp_service
        .update_camp(camp.id, &env.organizer, shrink(1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let updated = env
        .ctx
        .camp_service
        .update_camp(camp.id, &env.organizer, shrink(2))
        .await?;
    assert_eq!(updated.capacity, Some(2));
    assert_eq!(updated.participant_count, 2);
    Ok(())
}

#[tokio::test]
async fn organizer_can_lift_the_seat_limit() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let camp = env.camp(200.0, Some(1)).await?;
    env.ctx
        .ledger
        .create_registration(camp.id, participant_of(&env.participant), details())
        .await?;

    let latecomer = env.user("latecomer@example.com").await?;
    let err = env
        .ctx
        .ledger
        .create_registration(camp.id, participant_of(&latecomer), details())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CapacityExceeded(_)));

    let renamed = env
        .ctx
        .camp_service
        .update_camp(
            camp.id,
            &env.organizer,
            UpdateCampRequest {
                name: Some("Cardiology Basics II".to_string()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(renamed.capacity, Some(1));

    let unlimited = env
        .ctx
        .camp_service
        .update_camp(
            camp.id,
            &env.organizer,
            UpdateCampRequest {
                capacity: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(unlimited.capacity, None);
    assert_eq!(unlimited.seats_remaining(), None);

    env.ctx
        .ledger
        .create_registration(camp.id, participant_of(&latecomer), details())
        .await?;
    assert_eq!(env.ctx.camp_service.get_camp(camp.id).await?.participant_count, 2);

    let err = env
        .ctx
        .camp_service
        .update_camp(
            camp.id,
            &env.organizer,
            UpdateCampRequest {
                capacity: Some(Some(0)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn only_the_creating_organizer_manages_a_camp() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let camp = env.camp(200.0, None).await?;
    let rival = env
        .ctx
        .user_repo
        .upsert("rival@medcamp.test", "Dr. Rival", Role::Organizer)
        .await?;

    let err = env
        .ctx
        .camp_service
        .update_camp(
            camp.id,
            &rival,
            UpdateCampRequest {
                name: Some("Taken over".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = env.ctx.camp_service.delete_camp(camp.id, &rival).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn camp_with_paid_registrations_cannot_be_deleted() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let camp = env.camp(1000.0, None).await?;
    let registration = env
        .ctx
        .ledger
        .create_registration(camp.id, participant_of(&env.participant), details())
        .await?;
    env.ctx
        .ledger
        .mark_paid(
            registration.id,
            &PaymentReceipt {
                registration_id: registration.id,
                transaction_id: "txn_keep".to_string(),
                amount_cents: 100_000,
                currency: "bdt".to_string(),
                payment_method: "card".to_string(),
            },
        )
        .await?;

    let err = env
        .ctx
        .camp_service
        .delete_camp(camp.id, &env.organizer)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let empty = env.camp(100.0, None).await?;
    env.ctx.camp_service.delete_camp(empty.id, &env.organizer).await?;
    assert!(matches!(
        env.ctx.camp_service.get_camp(empty.id).await,
        Err(AppError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn feedback_is_limited_to_registered_participants() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;
    let camp = env.camp(0.0, None).await?;
    let stranger = env.user("stranger@example.com").await?;
    let request = || CreateFeedbackRequest {
        camp_id: camp.id,
        rating: 5,
        comment: Some("  Excellent suturing workshop  ".to_string()),
    };

    let err = env.ctx.feedback_service.submit(&stranger, request()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    env.ctx
        .ledger
        .create_registration(camp.id, participant_of(&env.participant), details())
        .await?;
    let feedback = env.ctx.feedback_service.submit(&env.participant, request()).await?;
    assert_eq!(feedback.comment.as_deref(), Some("Excellent suturing workshop"));

    let bad = CreateFeedbackRequest { rating: 9, ..request() };
    let err = env.ctx.feedback_service.submit(&env.participant, bad).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert_eq!(env.ctx.feedback_service.list_for_camp(camp.id).await?.len(), 1);
    assert_eq!(env.ctx.feedback_service.list_recent(10).await?.len(), 1);
    Ok(())
}
