use std::collections::HashSet;

use chrono::{Duration, Utc};
use clap::Parser;
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::{Pool, Sqlite};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matcha_server::{
    config::Config,
    crypto::{generate_salt, hash_password},
    db::{self, Gender, SexualPreference, SocialRepository, TagRepository},
    error::AppError,
};

const INTEREST_TAGS: &[&str] = &[
    "#music", "#travel", "#food", "#photography", "#fitness", "#movies", "#gaming",
    "#reading", "#art", "#cooking", "#hiking", "#yoga", "#sports", "#fashion", "#tech",
    "#nature", "#coffee", "#wine", "#dancing", "#pets", "#beach", "#mountains", "#camping",
    "#running", "#cycling", "#meditation", "#writing", "#theater", "#concerts", "#vegan",
    "#foodie", "#brunch", "#sushi", "#anime", "#scifi", "#jazz", "#rock", "#hiphop",
    "#dogs", "#cats", "#gardening", "#diy", "#painting",
];

const MALE_NAMES: &[&str] = &[
    "Lucas", "Hugo", "Louis", "Gabriel", "Arthur", "Jules", "Liam", "Noah", "Ethan", "Oliver",
    "James", "Leon", "Felix", "Mateo", "Diego", "Marco", "Luca", "Samuel", "Adam", "Victor",
];

const FEMALE_NAMES: &[&str] = &[
    "Emma", "Jade", "Louise", "Alice", "Chloe", "Lina", "Olivia", "Sophia", "Mia", "Amelia",
    "Isla", "Hannah", "Lea", "Clara", "Lucia", "Sofia", "Giulia", "Elena", "Zoe", "Nina",
];

const LAST_NAMES: &[&str] = &[
    "Martin", "Bernard", "Dubois", "Moreau", "Laurent", "Smith", "Johnson", "Brown", "Taylor",
    "Wilson", "Muller", "Schmidt", "Fischer", "Garcia", "Lopez", "Martinez", "Rossi", "Russo",
    "Bianchi", "Evans",
];

const CITIES: &[(&str, f64, f64)] = &[
    ("Paris", 48.8566, 2.3522),
    ("Lyon", 45.7640, 4.8357),
    ("Marseille", 43.2965, 5.3698),
    ("Toulouse", 43.6047, 1.4442),
    ("Nice", 43.7102, 7.2620),
    ("Bordeaux", 44.8378, -0.5792),
    ("New York", 40.7128, -74.0060),
    ("Los Angeles", 34.0522, -118.2437),
    ("Chicago", 41.8781, -87.6298),
    ("London", 51.5074, -0.1278),
    ("Manchester", 53.4808, -2.2426),
    ("Berlin", 52.5200, 13.4050),
    ("Munich", 48.1351, 11.5820),
    ("Madrid", 40.4168, -3.7038),
    ("Barcelona", 41.3851, 2.1734),
    ("Rome", 41.9028, 12.4964),
    ("Milan", 45.4642, 9.1900),
];

const HOBBIES: &[&str] = &[
    "music", "traveling", "cooking", "hiking", "photography", "reading", "gaming", "fitness",
    "art", "movies", "dancing", "yoga", "running", "cycling", "swimming",
];

const BIO_TEMPLATES: &[&str] = &[
    "Love {a} and {b}. Looking for someone to share adventures with.",
    "Passionate about {a}. When I'm not working, you'll find me {b}.",
    "{a} enthusiast | {b} lover | Always up for trying new things",
    "Just a {a} fan looking for good vibes and great conversations.",
    "Simple person who enjoys {a} and {b}. Let's grab coffee!",
];

/// Fill the database with fake verified profiles.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of profiles to generate
    #[arg(long, default_value_t = 500)]
    count: usize,

    /// Clear existing user data before seeding
    #[arg(long)]
    clear: bool,

    /// Password given to every generated user
    #[arg(long, default_value = "Password123!")]
    password: String,
}

struct SeedUser {
    username: String,
    first_name: String,
    last_name: String,
    bio: String,
    gender: Gender,
    preference: SexualPreference,
    date_of_birth: String,
    latitude: f64,
    longitude: f64,
    last_online: i64,
}

fn generate_user<R: Rng>(rng: &mut R, taken: &mut HashSet<String>) -> SeedUser {
    let gender = if rng.gen_bool(0.5) { Gender::Male } else { Gender::Female };
    let names = match gender {
        Gender::Male => MALE_NAMES,
        Gender::Female => FEMALE_NAMES,
    };

    let (first_name, last_name, username) = loop {
        let first = names.choose(rng).copied().unwrap_or("Alex");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("Doe");
        let username = format!(
            "{}{}{}",
            first.to_lowercase(),
            last.to_lowercase(),
            rng.gen_range(1..10_000)
        );
        if taken.insert(username.clone()) {
            break (first.to_string(), last.to_string(), username);
        }
    };

    // 70% straight, 10% gay, 20% bisexual
    let preference = match rng.gen_range(0..100) {
        0..=69 => SexualPreference::Straight,
        70..=79 => SexualPreference::Gay,
        _ => SexualPreference::Bisexual,
    };

    let age: i64 = rng.gen_range(18..=60);
    let today = Utc::now().date_naive();
    let date_of_birth = (today - Duration::days(age * 365 + rng.gen_range(0..364)))
        .format("%Y-%m-%d")
        .to_string();

    let (_, lat, lon) = CITIES.choose(rng).copied().unwrap_or(CITIES[0]);

    let mut hobbies = HOBBIES.choose_multiple(rng, 2);
    let a = hobbies.next().copied().unwrap_or("music");
    let b = hobbies.next().copied().unwrap_or("travel");
    let bio = BIO_TEMPLATES
        .choose(rng)
        .copied()
        .unwrap_or("{a} and {b}")
        .replace("{a}", a)
        .replace("{b}", b);

    let last_online = Utc::now().timestamp() - rng.gen_range(0..30 * 24 * 3600);

    SeedUser {
        username,
        first_name,
        last_name,
        bio,
        gender,
        preference,
        date_of_birth,
        latitude: lat + rng.gen_range(-0.1..0.1),
        longitude: lon + rng.gen_range(-0.1..0.1),
        last_online,
    }
}

async fn clear_data(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    for table in [
        "date_proposals",
        "messages",
        "notifications",
        "reports",
        "blocks",
        "likes",
        "visits",
        "user_tags",
        "images",
        "tokens",
        "users",
    ] {
        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(pool)
            .await?;
    }
    tracing::info!("🧹 Existing data cleared");
    Ok(())
}

async fn seed_users(
    pool: &Pool<Sqlite>,
    count: usize,
    password: &str,
    tag_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    // One argon2 run for the whole batch
    let salt = generate_salt();
    let hash = hash_password(password, &salt)?;

    let mut rng = rand::thread_rng();
    let mut taken = HashSet::new();
    let users: Vec<SeedUser> = (0..count).map(|_| generate_user(&mut rng, &mut taken)).collect();

    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(count);
    let now = Utc::now().timestamp();

    for user in &users {
        let id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO users (
    username, email, password_hash, password_salt, first_name, last_name, bio,
    gender, sexual_preference, date_of_birth, latitude, longitude, location_source,
    is_verified, last_online, created_at
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'seed', 1, ?, ?)
RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(format!("{}@seed.matcha.local", user.username))
        .bind(hash.as_slice())
        .bind(salt.as_slice())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.bio)
        .bind(user.gender)
        .bind(user.preference)
        .bind(&user.date_of_birth)
        .bind(user.latitude)
        .bind(user.longitude)
        .bind(user.last_online)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let tag_count = rng.gen_range(3..=7);
        for tag_id in tag_ids.choose_multiple(&mut rng, tag_count) {
            sqlx::query("INSERT INTO user_tags (user_id, tag_id) VALUES (?, ?) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        let image_count = rng.gen_range(1..=3);
        for i in 0..image_count {
            sqlx::query(
                "INSERT INTO images (user_id, file_path, is_profile_pic, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(format!("/uploads/seed/placeholder_{}_{}.jpg", id, i))
            .bind(i == 0)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        ids.push(id);
        if ids.len() % 100 == 0 {
            tracing::info!("  ... {}/{} users", ids.len(), count);
        }
    }

    tx.commit().await?;
    tracing::info!("✅ Inserted {} users", ids.len());
    Ok(ids)
}

async fn seed_interactions(pool: &Pool<Sqlite>, user_ids: &[i64]) -> Result<(), AppError> {
    if user_ids.len() < 2 {
        return Ok(());
    }

    let mut rng = rand::thread_rng();
    let mut tx = pool.begin().await?;
    let now = Utc::now();
    let (mut likes, mut visits) = (0u64, 0u64);

    for _ in 0..user_ids.len() * 3 {
        let (Some(&liker), Some(&liked)) = (user_ids.choose(&mut rng), user_ids.choose(&mut rng)) else {
            continue;
        };
        if liker == liked {
            continue;
        }
        likes += sqlx::query(
            "INSERT INTO likes (liker_id, liked_id, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(liker)
        .bind(liked)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for _ in 0..user_ids.len() * 5 {
        let (Some(&visitor), Some(&visited)) = (user_ids.choose(&mut rng), user_ids.choose(&mut rng)) else {
            continue;
        };
        if visitor == visited {
            continue;
        }
        let day = now - Duration::days(rng.gen_range(0..30));
        visits += sqlx::query(
            r#"
INSERT INTO visits (visitor_id, visited_id, visit_day, visit_count, timestamp)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT DO NOTHING
            "#,
        )
        .bind(visitor)
        .bind(visited)
        .bind(day.format("%Y-%m-%d").to_string())
        .bind(rng.gen_range(1..=5i64))
        .bind(day.timestamp())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for &id in user_ids {
        SocialRepository::refresh_fame(&mut *tx, id).await?;
    }

    tx.commit().await?;
    tracing::info!("✅ Created {} likes and {} visits", likes, visits);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,seed=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    tracing::info!("🌱 Seeding {} profiles (clear: {})", args.count, args.clear);

    let pool = db::connect(&config).await?;
    tracing::info!("✅ Database connected: {}", config.database_url);

    if args.clear {
        clear_data(&pool).await?;
    }

    let mut tag_ids = Vec::with_capacity(INTEREST_TAGS.len());
    for name in INTEREST_TAGS {
        tag_ids.push(TagRepository::get_or_create(&pool, name).await?.id);
    }
    tracing::info!("✅ {} tags ready", tag_ids.len());

    let user_ids = seed_users(&pool, args.count, &args.password, &tag_ids).await?;
    seed_interactions(&pool, &user_ids).await?;

    tracing::info!("🎉 Seeding complete, password for every user: {}", args.password);
    Ok(())
}
