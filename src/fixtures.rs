//! Seed data for a fresh store, and the consistency check that keeps it
//! honest.
//!
//! Seed donations are generated so that, per campaign, their amounts add
//! up to the campaign's `currentAmount` and their timestamps fall between
//! the campaign's creation and the moment of generation.

use crate::models::{Campaign, Donation, ProfileStats, UserProfile};
use crate::storage::campaign::list_campaigns;
use crate::storage::donation::{donation_totals, list_donations};
use crate::storage::profile::{load_profile, save_profile};
use crate::storage::{KeyValueStore, StorageError, DONATIONS_KEY, INITIALIZED_KEY, PROJECTS_KEY};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

/// Wallet of the seed user profile.
pub const CURRENT_USER_WALLET: &str = "0x1234567890123456789012345678901234567890";

/// Other donors that appear in seed donations.
pub const DONOR_POOL: [&str; 5] = [
    "0x1111111111111111111111111111111111111111",
    "0x2222222222222222222222222222222222222222",
    "0x3333333333333333333333333333333333333333",
    "0x4444444444444444444444444444444444444444",
    "0x5555555555555555555555555555555555555555",
];

/// Share of seed donations attributed to the current user.
const CURRENT_USER_SHARE: f64 = 0.3;
const MIN_DONATION: f64 = 5000.0;
const AMOUNT_TOLERANCE: f64 = 0.01;

// (title, description, goal, current, creator, creator name, age in days, image)
const CATALOGUE: [(&str, &str, f64, f64, &str, &str, i64, &str); 8] = [
    (
        "Construcción de Escuela Rural",
        "Ayudemos a construir una escuela en una comunidad rural que necesita acceso a educación. El proyecto incluye aulas, biblioteca y área de recreación para más de 100 niños.",
        500_000.0,
        375_000.0,
        "0x1234567890123456789012345678901234567890",
        "María González",
        30,
        "https://images.unsplash.com/photo-1503676260721-4d00c4ef78ba?w=800",
    ),
    (
        "Reforestación del Bosque Nativo",
        "Proyecto para plantar 10,000 árboles nativos en áreas deforestadas. Cada árbol ayudará a restaurar el ecosistema y combatir el cambio climático.",
        300_000.0,
        285_000.0,
        "0x2345678901234567890123456789012345678901",
        "Carlos Rodríguez",
        14,
        "https://images.unsplash.com/photo-1441974231531-c6227db76b6e?w=800",
    ),
    (
        "Centro de Salud Comunitario",
        "Construcción de un centro de salud que brindará atención médica gratuita a más de 500 familias de bajos recursos en la zona.",
        800_000.0,
        120_000.0,
        "0x3456789012345678901234567890123456789012",
        "Ana Martínez",
        7,
        "https://images.unsplash.com/photo-1576091160399-112ba8d25d1f?w=800",
    ),
    (
        "Programa de Alimentación Infantil",
        "Proveer comidas nutritivas diarias a 200 niños en situación de vulnerabilidad durante todo el año escolar.",
        250_000.0,
        250_000.0,
        "0x4567890123456789012345678901234567890123",
        "Luis Fernández",
        30,
        "https://images.unsplash.com/photo-1503454537195-1dcabb73ffb9?w=800",
    ),
    (
        "Taller de Capacitación Laboral",
        "Crear un espacio donde jóvenes puedan aprender oficios como carpintería, electricidad y plomería para mejorar sus oportunidades laborales.",
        400_000.0,
        85_000.0,
        "0x5678901234567890123456789012345678901234",
        "Sofía López",
        7,
        "https://images.unsplash.com/photo-1504328345606-18bbc8c9d7d1?w=800",
    ),
    (
        "Biblioteca Móvil para Barrios",
        "Un bibliobús que recorrerá diferentes barrios llevando libros, talleres de lectura y actividades culturales a comunidades que no tienen acceso a bibliotecas.",
        350_000.0,
        210_000.0,
        "0x6789012345678901234567890123456789012345",
        "Roberto Sánchez",
        14,
        "https://images.unsplash.com/photo-1481627834876-b7833e8f5570?w=800",
    ),
    (
        "Huerta Comunitaria Orgánica",
        "Establecer una huerta comunitaria donde familias puedan cultivar sus propios alimentos orgánicos y aprender técnicas de agricultura sostenible.",
        180_000.0,
        45_000.0,
        "0x7890123456789012345678901234567890123456",
        "Patricia Díaz",
        7,
        "https://images.unsplash.com/photo-1416879595882-3373a0480b5b?w=800",
    ),
    (
        "Rescate de Animales Callejeros",
        "Centro de rescate y rehabilitación para animales abandonados. Incluye atención veterinaria, esterilización y programa de adopción responsable.",
        450_000.0,
        320_000.0,
        "0x8901234567890123456789012345678901234567",
        "Diego Morales",
        14,
        "https://images.unsplash.com/photo-1601758228041-f3b2795255f1?w=800",
    ),
];

/// The fixed seed campaigns, created 7, 14 or 30 days before `now`.
pub fn generate_campaigns(now: DateTime<Utc>) -> Vec<Campaign> {
    CATALOGUE
        .iter()
        .enumerate()
        .map(
            |(i, &(title, description, goal, current, creator, name, age_days, image))| Campaign {
                id: format!("campaign_{}", i + 1),
                title: title.to_string(),
                description: description.to_string(),
                goal_amount: goal,
                current_amount: current,
                creator_address: creator.to_string(),
                creator_name: name.to_string(),
                created_at: now - Duration::days(age_days),
                image_url: image.to_string(),
            },
        )
        .collect()
}

/// Generate donations consistent with `campaigns`.
///
/// Every campaign with a nonzero `currentAmount` gets between 2 and 6
/// donations (fewer for small amounts). All but the last are drawn from
/// 5%..50% of what is left, rounded to thousands; the last takes the exact
/// remainder. The result is sorted newest first.
pub fn generate_donations<R: Rng + ?Sized>(
    campaigns: &[Campaign],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Donation> {
    let mut donations = Vec::new();
    let mut next_id = 1u32;

    for campaign in campaigns {
        if campaign.current_amount <= 0.0 {
            continue;
        }

        let by_size = ((campaign.current_amount / 10_000.0).floor() as usize).max(2);
        let count = rng.random_range(2..=6usize).min(by_size);
        let span_ms = (now - campaign.created_at).num_milliseconds().max(0);
        let mut remaining = campaign.current_amount;

        for i in 0..count {
            let amount = if i + 1 == count {
                remaining
            } else {
                match split_amount(remaining, rng) {
                    Some(amount) => amount,
                    None => remaining,
                }
            };
            remaining -= amount;

            let timestamp = campaign.created_at + Duration::milliseconds(rng.random_range(0..=span_ms));
            let donor_address = if rng.random_bool(CURRENT_USER_SHARE) {
                CURRENT_USER_WALLET
            } else {
                DONOR_POOL[rng.random_range(0..DONOR_POOL.len())]
            };

            donations.push(Donation {
                id: format!("donation_{}", next_id),
                project_id: campaign.id.clone(),
                amount,
                donor_address: donor_address.to_string(),
                timestamp,
            });
            next_id += 1;

            if remaining <= 0.0 {
                break;
            }
        }
    }

    donations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    donations
}

/// One non-final share of `remaining`, or `None` when `remaining` is too
/// small to split.
fn split_amount<R: Rng + ?Sized>(remaining: f64, rng: &mut R) -> Option<f64> {
    let min = (remaining * 0.05).floor().max(MIN_DONATION);
    let max = (remaining * 0.5).floor();
    if max < min {
        return None;
    }

    let drawn = rng.random_range(min as i64..=max as i64) as f64;
    let rounded = (drawn / 1000.0).round() * 1000.0;
    // Rounding must not swallow the remainder.
    Some(rounded.clamp(1000.0, remaining - 1000.0))
}

/// Outcome of [`verify_consistency`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Check that every campaign's donations add up to its `currentAmount`
/// (within 0.01) and that no donation predates its campaign or lies in the
/// future. All violations are reported.
pub fn verify_consistency(
    campaigns: &[Campaign],
    donations: &[Donation],
    now: DateTime<Utc>,
) -> ConsistencyReport {
    let mut errors = Vec::new();

    for campaign in campaigns {
        let own: Vec<&Donation> = donations
            .iter()
            .filter(|d| d.project_id == campaign.id)
            .collect();
        let total: f64 = own.iter().map(|d| d.amount).sum();

        if (total - campaign.current_amount).abs() > AMOUNT_TOLERANCE {
            errors.push(format!(
                "Campaign {}: currentAmount ({}) does not match donation total ({})",
                campaign.id, campaign.current_amount, total
            ));
        }

        for donation in own {
            if donation.timestamp < campaign.created_at {
                errors.push(format!(
                    "Donation {}: timestamp ({}) predates campaign {}",
                    donation.id,
                    donation.timestamp.to_rfc3339(),
                    campaign.id
                ));
            }
            if donation.timestamp > now {
                errors.push(format!(
                    "Donation {}: timestamp ({}) is in the future",
                    donation.id,
                    donation.timestamp.to_rfc3339()
                ));
            }
        }
    }

    ConsistencyReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// The seed user profile, with donation stats taken from `donations`.
pub fn generate_profile(donations: &[Donation], now: DateTime<Utc>) -> UserProfile {
    let (total_donated, donations_count) = donation_totals(donations, CURRENT_USER_WALLET);

    UserProfile {
        id: "user_1".to_string(),
        username: "Juan Pérez".to_string(),
        wallet_address: CURRENT_USER_WALLET.to_string(),
        avatar: "https://api.dicebear.com/7.x/avataaars/svg?seed=Juan".to_string(),
        bio: "Apasionado por el impacto social y la tecnología. Creo campañas para ayudar a comunidades necesitadas.".to_string(),
        created_at: now - Duration::days(180),
        stats: ProfileStats {
            campaigns_created: 3,
            total_donated,
            donations_count,
        },
    }
}

/// What [`initialize_if_empty`] did to the record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedAction {
    /// The store was already marked as initialized.
    AlreadyInitialized,
    /// Campaigns and donations were written to an empty store.
    Seeded,
    /// Stored campaigns had no donations; donations were generated for them.
    BackfilledDonations,
    /// Existing records were left as they were.
    KeptExisting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedOutcome {
    pub profile_created: bool,
    pub action: SeedAction,
    /// Consistency of the stored records, when campaigns or donations were
    /// written.
    pub report: Option<ConsistencyReport>,
}

/// Seed `store` if it holds no records yet.
///
/// The profile is created whenever it is missing. Campaigns and donations
/// are only written once, guarded by the initialized marker, and existing
/// non-empty collections are never overwritten. Calling this again changes
/// nothing.
pub async fn initialize_if_empty<S, R>(
    store: &S,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<SeedOutcome, StorageError>
where
    S: KeyValueStore,
    R: Rng + ?Sized,
{
    let profile_created = if load_profile(store).await?.is_none() {
        let donations = list_donations(store).await?;
        save_profile(store, &generate_profile(&donations, now)).await?;
        true
    } else {
        false
    };

    if store.get(INITIALIZED_KEY).await?.as_deref() == Some("true") {
        return Ok(SeedOutcome {
            profile_created,
            action: SeedAction::AlreadyInitialized,
            report: None,
        });
    }

    let mut campaigns = list_campaigns(store).await?;
    let existing_donations = list_donations(store).await?;
    let marker = (INITIALIZED_KEY.to_string(), "true".to_string());

    let action = match (campaigns.is_empty(), existing_donations.is_empty()) {
        (true, true) => {
            campaigns = generate_campaigns(now);
            let donations = generate_donations(&campaigns, now, rng);
            store
                .set_many(vec![
                    (PROJECTS_KEY.to_string(), serde_json::to_string(&campaigns)?),
                    (DONATIONS_KEY.to_string(), serde_json::to_string(&donations)?),
                    marker,
                ])
                .await?;
            SeedAction::Seeded
        }
        (false, true) => {
            let donations = generate_donations(&campaigns, now, rng);
            store
                .set_many(vec![
                    (DONATIONS_KEY.to_string(), serde_json::to_string(&donations)?),
                    marker,
                ])
                .await?;
            SeedAction::BackfilledDonations
        }
        _ => {
            store.set_many(vec![marker]).await?;
            SeedAction::KeptExisting
        }
    };

    let report = match action {
        SeedAction::Seeded | SeedAction::BackfilledDonations => {
            let donations = list_donations(store).await?;
            if profile_created {
                save_profile(store, &generate_profile(&donations, now)).await?;
            }

            let report = verify_consistency(&campaigns, &donations, now);
            if report.valid {
                tracing::info!(
                    action = "seed",
                    campaigns = campaigns.len(),
                    donations = donations.len(),
                    "Seed data initialized, all consistency checks passed"
                );
            } else {
                tracing::warn!(
                    action = "seed",
                    errors = ?report.errors,
                    "Seed data inconsistent"
                );
            }
            Some(report)
        }
        _ => None,
    };

    Ok(SeedOutcome {
        profile_created,
        action,
        report,
    })
}
