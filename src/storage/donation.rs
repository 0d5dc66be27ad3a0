//! Donation records and funding.

use super::campaign::list_campaigns;
use super::{read_json, write_json, KeyValueStore, StorageError, DONATIONS_KEY, PROJECTS_KEY};
use crate::models::{Donation, ProfileStats};
use chrono::{DateTime, Utc};

/// All stored donations. Empty when none were stored.
pub async fn list_donations<S: KeyValueStore>(store: &S) -> Result<Vec<Donation>, StorageError> {
    Ok(read_json(store, DONATIONS_KEY).await?.unwrap_or_default())
}

pub async fn save_donations<S: KeyValueStore>(
    store: &S,
    donations: &[Donation],
) -> Result<(), StorageError> {
    write_json(store, DONATIONS_KEY, donations).await
}

/// Donations made by `wallet` (case-insensitive), newest first.
pub async fn donations_by_donor<S: KeyValueStore>(
    store: &S,
    wallet: &str,
) -> Result<Vec<Donation>, StorageError> {
    let mut donations: Vec<Donation> = list_donations(store)
        .await?
        .into_iter()
        .filter(|d| d.donor_address.eq_ignore_ascii_case(wallet))
        .collect();
    donations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(donations)
}

/// Sum and count a wallet's donations.
pub fn donation_totals<'a>(
    donations: impl IntoIterator<Item = &'a Donation>,
    wallet: &str,
) -> (f64, u32) {
    donations
        .into_iter()
        .filter(|d| d.donor_address.eq_ignore_ascii_case(wallet))
        .fold((0.0, 0), |(total, count), d| (total + d.amount, count + 1))
}

/// Profile statistics derived from stored records.
pub async fn profile_stats<S: KeyValueStore>(
    store: &S,
    wallet: &str,
) -> Result<ProfileStats, StorageError> {
    let campaigns_created = list_campaigns(store)
        .await?
        .iter()
        .filter(|c| c.creator_address.eq_ignore_ascii_case(wallet))
        .count() as u32;
    let (total_donated, donations_count) = donation_totals(&list_donations(store).await?, wallet);

    Ok(ProfileStats {
        campaigns_created,
        total_donated,
        donations_count,
    })
}

/// Record a contribution of `amount` from `donor` to a campaign.
///
/// The campaign's `currentAmount` and the donation list are written in a
/// single `set_many`, so they never disagree on disk.
pub async fn fund_campaign<S: KeyValueStore>(
    store: &S,
    campaign_id: &str,
    amount: f64,
    donor: &str,
    now: DateTime<Utc>,
) -> Result<Donation, StorageError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(StorageError::InvalidAmount(
            "amount must be a positive number".into(),
        ));
    }

    let mut campaigns = list_campaigns(store).await?;
    let campaign = campaigns
        .iter_mut()
        .find(|c| c.id == campaign_id)
        .ok_or_else(|| StorageError::NotFound(format!("Campaign not found: {}", campaign_id)))?;
    campaign.current_amount += amount;
    let current_amount = campaign.current_amount;

    let donation = Donation {
        id: format!("donation_{}", nanoid::nanoid!(9)),
        project_id: campaign_id.to_string(),
        amount,
        donor_address: donor.to_string(),
        timestamp: now,
    };

    let mut donations = list_donations(store).await?;
    donations.insert(0, donation.clone());

    store
        .set_many(vec![
            (PROJECTS_KEY.to_string(), serde_json::to_string(&campaigns)?),
            (DONATIONS_KEY.to_string(), serde_json::to_string(&donations)?),
        ])
        .await?;

    tracing::info!(
        action = "campaign_funded",
        campaign = %campaign_id,
        amount,
        current_amount,
        "Donation recorded"
    );

    Ok(donation)
}
