//! Campaign records.

use super::{read_json, write_json, KeyValueStore, StorageError, PROJECTS_KEY};
use crate::models::{Campaign, CampaignDraft};
use chrono::{DateTime, Utc};

/// All stored campaigns, in insertion order. Empty when none were stored.
pub async fn list_campaigns<S: KeyValueStore>(store: &S) -> Result<Vec<Campaign>, StorageError> {
    Ok(read_json(store, PROJECTS_KEY).await?.unwrap_or_default())
}

pub async fn save_campaigns<S: KeyValueStore>(
    store: &S,
    campaigns: &[Campaign],
) -> Result<(), StorageError> {
    write_json(store, PROJECTS_KEY, campaigns).await
}

/// Look up one campaign by id.
pub async fn get_campaign<S: KeyValueStore>(
    store: &S,
    id: &str,
) -> Result<Campaign, StorageError> {
    list_campaigns(store)
        .await?
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| StorageError::NotFound(format!("Campaign not found: {}", id)))
}

/// Validate a draft and store it as a new campaign with nothing raised yet.
pub async fn create_campaign<S: KeyValueStore>(
    store: &S,
    draft: CampaignDraft,
    creator_address: &str,
    creator_name: &str,
    now: DateTime<Utc>,
) -> Result<Campaign, StorageError> {
    let title = draft.title.trim();
    let description = draft.description.trim();

    if title.is_empty() {
        return Err(StorageError::InvalidCampaign("title is required".into()));
    }
    if description.is_empty() {
        return Err(StorageError::InvalidCampaign(
            "description is required".into(),
        ));
    }
    if !draft.goal_amount.is_finite() || draft.goal_amount <= 0.0 {
        return Err(StorageError::InvalidAmount(
            "goal must be a positive number".into(),
        ));
    }

    let campaign = Campaign {
        id: format!("campaign_{}", nanoid::nanoid!(12)),
        title: title.to_string(),
        description: description.to_string(),
        goal_amount: draft.goal_amount,
        current_amount: 0.0,
        creator_address: creator_address.to_string(),
        creator_name: creator_name.to_string(),
        created_at: now,
        image_url: draft.image_url,
    };

    let mut campaigns = list_campaigns(store).await?;
    campaigns.push(campaign.clone());
    save_campaigns(store, &campaigns).await?;

    tracing::info!(action = "campaign_created", id = %campaign.id, "Campaign stored");
    Ok(campaign)
}

/// Replace the stored campaign with the same id.
pub async fn update_campaign<S: KeyValueStore>(
    store: &S,
    campaign: Campaign,
) -> Result<(), StorageError> {
    let mut campaigns = list_campaigns(store).await?;
    let slot = campaigns
        .iter_mut()
        .find(|c| c.id == campaign.id)
        .ok_or_else(|| StorageError::NotFound(format!("Campaign not found: {}", campaign.id)))?;
    *slot = campaign;
    save_campaigns(store, &campaigns).await
}
