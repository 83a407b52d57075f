use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use ledgerly_accounts::{Account, ExternalTarget, LedgerEntry, MoneySource};
use ledgerly_core::{AccountId, Currency, DomainError, DomainResult, Entity, Money};
use ledgerly_infra::{MovementRequest, RequestedAmount};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateAccountRequest {
    pub currency: Option<String>,
}

/// Amount in major units, as a string (`"100.50"`) or a JSON number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(serde_json::Number),
}

impl AmountInput {
    fn as_text(&self) -> String {
        match self {
            AmountInput::Text(s) => s.clone(),
            AmountInput::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MovementBody {
    pub amount: AmountInput,
    pub currency: Option<String>,
    pub source: Option<String>,
    pub bank_account_number: Option<String>,
    pub routing_number: Option<String>,
    pub wallet_address: Option<String>,
}

impl MovementBody {
    /// Explicit currency of the amount, if the caller gave one.
    pub fn currency(&self) -> DomainResult<Option<Currency>> {
        self.currency.as_deref().map(Currency::parse).transpose()
    }

    pub fn external_target(&self) -> DomainResult<Option<ExternalTarget>> {
        match (
            self.bank_account_number.as_deref(),
            self.routing_number.as_deref(),
            self.wallet_address.as_deref(),
        ) {
            (None, None, None) => Ok(None),
            (Some(_), _, Some(_)) => Err(DomainError::validation(
                "give either a bank account or a wallet address, not both",
            )),
            (None, Some(_), _) => Err(DomainError::validation(
                "routing number requires a bank account number",
            )),
            (Some(account), routing, None) => ExternalTarget::bank(account, routing).map(Some),
            (None, None, Some(address)) => ExternalTarget::wallet(address).map(Some),
        }
    }

    /// Without an explicit currency the amount is taken in the account's currency.
    pub fn into_request(self, account_id: AccountId) -> DomainResult<MovementRequest> {
        let amount = RequestedAmount::parse_major(&self.amount.as_text(), self.currency()?)?;
        let external_target = self.external_target()?;
        let source = match (&self.source, &external_target) {
            (Some(raw), _) => raw.parse::<MoneySource>()?,
            (None, Some(target)) => target.money_source(),
            (None, None) => MoneySource::Internal,
        };

        Ok(MovementRequest {
            account_id,
            amount,
            source,
            external_target,
        })
    }
}

// -------------------------
// Response mapping
// -------------------------

fn money_to_json(money: &Money) -> JsonValue {
    json!({
        "amount": money.to_major().to_string(),
        "amount_minor": money.amount(),
        "currency": money.currency().code(),
    })
}

pub fn account_to_json(account: &Account) -> JsonValue {
    json!({
        "id": account.id().to_string(),
        "owner_id": account.owner_id().to_string(),
        "currency": account.currency().code(),
        "balance": money_to_json(&account.balance()),
        "created_at": account.created_at().to_rfc3339(),
        "updated_at": account.updated_at().to_rfc3339(),
    })
}

pub fn balance_to_json(account_id: AccountId, balance: &Money) -> JsonValue {
    json!({
        "account_id": account_id.to_string(),
        "balance": money_to_json(balance),
    })
}

pub fn entry_to_json(entry: &LedgerEntry) -> JsonValue {
    let conversion = entry.conversion.as_ref().map(|c| {
        json!({
            "original": money_to_json(&c.original()),
            "rate": c.rate().to_string(),
        })
    });

    json!({
        "id": entry.id.to_string(),
        "account_id": entry.account_id.to_string(),
        "direction": if entry.is_credit() { "credit" } else { "debit" },
        "amount": money_to_json(&entry.amount),
        "balance": money_to_json(&entry.balance),
        "money_source": entry.money_source.as_str(),
        "conversion": conversion,
        "external_target": entry.external_target_masked,
        "created_at": entry.created_at.to_rfc3339(),
    })
}
