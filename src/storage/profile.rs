//! The local user profile.

use super::donation::profile_stats;
use super::{read_json, write_json, KeyValueStore, StorageError, PROFILE_KEY};
use crate::models::UserProfile;

pub async fn load_profile<S: KeyValueStore>(store: &S) -> Result<Option<UserProfile>, StorageError> {
    read_json(store, PROFILE_KEY).await
}

pub async fn save_profile<S: KeyValueStore>(
    store: &S,
    profile: &UserProfile,
) -> Result<(), StorageError> {
    write_json(store, PROFILE_KEY, profile).await
}

/// Recompute the stored profile's donation statistics from stored records.
///
/// `campaignsCreated` keeps its stored value when no stored campaign names
/// the profile's wallet as creator. Returns `None` when there is no profile.
pub async fn refresh_profile_stats<S: KeyValueStore>(
    store: &S,
) -> Result<Option<UserProfile>, StorageError> {
    let Some(mut profile) = load_profile(store).await? else {
        return Ok(None);
    };

    let stats = profile_stats(store, &profile.wallet_address).await?;
    profile.stats.total_donated = stats.total_donated;
    profile.stats.donations_count = stats.donations_count;
    if stats.campaigns_created > 0 {
        profile.stats.campaigns_created = stats.campaigns_created;
    }

    save_profile(store, &profile).await?;
    Ok(Some(profile))
}
