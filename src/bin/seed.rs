use std::{str::FromStr, sync::Arc};

use chrono::{Duration, Utc};
use clap::Parser;
use fake::{
    faker::{
        address::en::CityName,
        lorem::en::Sentence,
        name::en::Name,
        phone_number::en::PhoneNumber,
    },
    Fake,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use medcamp::{
    config::Settings,
    domain::{CreateCampRequest, Gender, Participant, RegistrationDetails, Role},
    payments::{FakeGateway, PaymentGateway},
    service::ServiceContext,
};

#[derive(Parser)]
#[command(name = "seed")]
#[command(about = "Populate a MedCamp database with demo data", long_about = None)]
struct Cli {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://medcamp.db")]
    database_url: String,

    /// Number of camps per organizer
    #[arg(long, default_value_t = 3)]
    camps: usize,

    /// Number of participants to register
    #[arg(long, default_value_t = 12)]
    participants: usize,

    /// Share of registrations to settle through the fake gateway (0.0 - 1.0)
    #[arg(long, default_value_t = 0.5)]
    paid_ratio: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    println!("🌱 Starting database seeding...");

    let options = SqliteConnectOptions::from_str(&cli.database_url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Payments are settled against the in-process gateway; no Stripe keys needed.
    let gateway: Arc<dyn PaymentGateway> = Arc::new(FakeGateway::new("seed"));
    let settings = Settings::default();
    let ctx = ServiceContext::new(db_pool, Some(gateway), &settings);

    println!("🩺 Creating organizers and camps...");
    let organizers = [
        ("lead@medcamp.local", "Dr. Farzana Rahman"),
        ("coordinator@medcamp.local", "Dr. Imran Hossain"),
    ];

    let mut camps = Vec::new();
    for (email, name) in organizers {
        let organizer = ctx.user_repo.upsert(email, name, Role::Organizer).await?;
        for i in 0..cli.camps {
            let city: String = CityName().fake();
            let camp = ctx.camp_service.create_camp(&organizer, CreateCampRequest {
                name: format!("{} Health Camp #{}", city, i + 1),
                fee: [0.0, 500.0, 1000.0, 1500.0][i % 4],
                capacity: if i % 3 == 2 { None } else { Some((10..40).fake()) },
                scheduled_at: Utc::now() + Duration::days((3..60).fake()),
                location: city,
                healthcare_professional: Name().fake(),
                description: Sentence(8..16).fake(),
                image_url: None,
            }).await?;
            camps.push(camp);
        }
    }
    println!("  ✅ Created {} camps", camps.len());

    println!("👥 Registering participants...");
    let mut registered = 0;
    let mut paid = 0;
    for i in 0..cli.participants {
        let name: String = Name().fake();
        let email = format!("participant{}@medcamp.local", i + 1);
        let user = ctx.user_repo.upsert(&email, &name, Role::Participant).await?;

        let camp = &camps[i % camps.len()];
        let details = RegistrationDetails {
            age: (18..65).fake(),
            phone: PhoneNumber().fake(),
            gender: [Gender::Female, Gender::Male, Gender::Other][i % 3],
            emergency_contact: format!("{}, {}", Name().fake::<String>(), PhoneNumber().fake::<String>()),
        };
        let participant = Participant { name, email };

        let registration = match ctx.ledger.create_registration(camp.id, participant, details).await {
            Ok(r) => r,
            Err(e) => {
                println!("  ⚠️  Skipped {}: {}", user.email, e);
                continue;
            }
        };
        registered += 1;

        if camp.fee_cents > 0 && (i as f64) < cli.paid_ratio * cli.participants as f64 {
            let handle = ctx.broker.create_intent(registration.id, &user).await?;
            ctx.broker.confirm_intent(handle.intent_id, "pm_card_visa", &user).await?;
            paid += 1;
        }
    }
    println!("  ✅ Registered {} participants ({} paid)", registered, paid);

    println!("🎉 Seeding complete!");
    println!("   Organizers: {}", organizers.map(|(e, _)| e).join(", "));

    Ok(())
}
