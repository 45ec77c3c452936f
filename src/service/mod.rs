pub mod ledger;
pub mod broker;
pub mod reporter;
pub mod camp_service;
pub mod feedback_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::auth::AuthService;
use crate::config::Settings;
use crate::payments::PaymentGateway;
use crate::repository::*;
use ledger::RegistrationLedger;
use broker::PaymentIntentBroker;
use reporter::ReconciliationReporter;
use camp_service::CampService;
use feedback_service::FeedbackService;

pub struct ServiceContext {
    pub camp_repo: Arc<dyn CampRepository>,
    pub registration_repo: Arc<dyn RegistrationRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub intent_repo: Arc<dyn IntentRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub feedback_repo: Arc<dyn FeedbackRepository>,
    pub auth_service: Arc<AuthService>,
    pub ledger: Arc<RegistrationLedger>,
    pub broker: Arc<PaymentIntentBroker>,
    pub reporter: Arc<ReconciliationReporter>,
    pub camp_service: Arc<CampService>,
    pub feedback_service: Arc<FeedbackService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    /// Wires the SQLite repositories and services over one pool. `gateway`
    /// is `None` when no payment processor is configured.
    pub fn new(
        db_pool: SqlitePool,
        gateway: Option<Arc<dyn PaymentGateway>>,
        settings: &Settings,
    ) -> Self {
        let camp_repo: Arc<dyn CampRepository> = Arc::new(SqliteCampRepository::new(db_pool.clone()));
        let registration_repo: Arc<dyn RegistrationRepository> =
            Arc::new(SqliteRegistrationRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let intent_repo: Arc<dyn IntentRepository> = Arc::new(SqliteIntentRepository::new(db_pool.clone()));
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let feedback_repo: Arc<dyn FeedbackRepository> = Arc::new(SqliteFeedbackRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            user_repo.clone(),
            settings.auth.clone(),
        ));

        let ledger = Arc::new(RegistrationLedger::new(
            registration_repo.clone(),
            camp_repo.clone(),
            payment_repo.clone(),
        ));
        let broker = Arc::new(PaymentIntentBroker::new(
            ledger.clone(),
            camp_repo.clone(),
            intent_repo.clone(),
            payment_repo.clone(),
            gateway,
            settings.payments.clone(),
        ));
        let reporter = Arc::new(ReconciliationReporter::new(
            registration_repo.clone(),
            camp_repo.clone(),
        ));
        let camp_service = Arc::new(CampService::new(camp_repo.clone(), broker.clone()));
        let feedback_service = Arc::new(FeedbackService::new(
            feedback_repo.clone(),
            registration_repo.clone(),
        ));

        Self {
            camp_repo,
            registration_repo,
            payment_repo,
            intent_repo,
            user_repo,
            feedback_repo,
            auth_service,
            ledger,
            broker,
            reporter,
            camp_service,
            feedback_service,
            db_pool,
        }
    }
}
