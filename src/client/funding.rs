//! Funding a campaign from the mini-app.
//!
//! The donor re-confirms their wallet with the host, approves a USDC
//! deposit, and only then is the contribution recorded in the store.

use super::host::{HostWallet, TokenName, TransactionResult};
use crate::models::Donation;
use crate::storage::campaign::get_campaign;
use crate::storage::donation::fund_campaign;
use crate::storage::{KeyValueStore, StorageError};
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum FundingError {
    #[error("invalid amount")]
    InvalidAmount,

    #[error("wallet authentication failed")]
    AuthenticationFailed,

    /// The host signed with a different wallet than the signed-in one.
    #[error("donor wallet {signer} does not match session wallet {session}")]
    WalletMismatch { session: String, signer: String },

    #[error("payment cancelled")]
    Cancelled,

    #[error("payment failed")]
    PaymentFailed(Option<String>),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FundingError {
    /// Message shown to the donor.
    pub fn user_message(&self) -> String {
        match self {
            FundingError::InvalidAmount => "Por favor ingresá un monto válido".to_string(),
            FundingError::AuthenticationFailed => {
                "No se pudo autenticar tu billetera. Por favor intentá nuevamente.".to_string()
            }
            FundingError::WalletMismatch { .. } => {
                "La billetera no coincide con tu sesión. Volvé a iniciar sesión.".to_string()
            }
            FundingError::Cancelled => "Cancelaste el pago".to_string(),
            FundingError::PaymentFailed(Some(message)) => message.clone(),
            FundingError::PaymentFailed(None) => {
                "El pago no se pudo completar. Por favor intentá nuevamente.".to_string()
            }
            FundingError::Storage(StorageError::NotFound(_)) => {
                "La campaña no existe".to_string()
            }
            FundingError::Storage(_) => {
                "Ocurrió un error al procesar el pago. Por favor intentá nuevamente.".to_string()
            }
        }
    }
}

/// Parse a user-entered amount. Accepts a decimal comma.
pub fn parse_amount(input: &str) -> Result<f64, FundingError> {
    let amount: f64 = input
        .trim()
        .replace(',', ".")
        .parse()
        .map_err(|_| FundingError::InvalidAmount)?;

    if !amount.is_finite() || amount <= 0.0 {
        return Err(FundingError::InvalidAmount);
    }
    Ok(amount)
}

/// Funding for the signed-in wallet.
pub struct FundingFlow<'a, H, S> {
    host: &'a H,
    store: &'a S,
    session_wallet: &'a str,
}

impl<'a, H: HostWallet, S: KeyValueStore> FundingFlow<'a, H, S> {
    pub fn new(host: &'a H, store: &'a S, session_wallet: &'a str) -> Self {
        FundingFlow {
            host,
            store,
            session_wallet,
        }
    }

    /// Fund `campaign_id` with the amount the donor typed.
    pub async fn fund(
        &self,
        campaign_id: &str,
        amount_input: &str,
        now: DateTime<Utc>,
    ) -> Result<Donation, FundingError> {
        let amount = parse_amount(amount_input)?;
        let campaign = get_campaign(self.store, campaign_id).await?;

        let donor = match self.host.authenticate(None).await {
            TransactionResult::Success(auth) => auth.wallet,
            _ => return Err(FundingError::AuthenticationFailed),
        };
        if !donor.eq_ignore_ascii_case(self.session_wallet) {
            tracing::warn!(
                action = "fund",
                session = %self.session_wallet,
                signer = %donor,
                "Donor wallet differs from session wallet"
            );
            return Err(FundingError::WalletMismatch {
                session: self.session_wallet.to_string(),
                signer: donor,
            });
        }

        match self.host.deposit(&amount.to_string(), TokenName::Usdc).await {
            TransactionResult::Success(()) => {}
            TransactionResult::Cancelled => return Err(FundingError::Cancelled),
            TransactionResult::Failed(message) => return Err(FundingError::PaymentFailed(message)),
        }

        let donation = fund_campaign(self.store, &campaign.id, amount, &donor, now).await?;
        tracing::info!(
            action = "fund",
            campaign = %campaign.title,
            amount,
            "Campaign funded"
        );
        Ok(donation)
    }
}
