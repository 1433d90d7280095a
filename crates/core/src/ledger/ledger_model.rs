//! Share ledger domain models.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{OPTION_POOL_ID, OPTION_POOL_NAME};
use crate::errors::{Error, Result, ValidationError};

/// Liquidation terms carried by a preferred class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreferredTerms {
    /// Lower ranks are paid first.
    pub seniority: i32,
    pub liquidation_multiple: Decimal,
    pub participating: bool,
    /// Ceiling on total payout, as a multiple of the original investment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participation_cap: Option<Decimal>,
    /// Index of the round that issued the class.
    pub round_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShareClassKind {
    Common,
    Preferred(PreferredTerms),
    OptionPool,
}

/// One class of equity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShareClass {
    pub id: String,
    pub name: String,
    pub kind: ShareClassKind,
    pub shares: u64,
    pub original_investment: Decimal,
}

impl ShareClass {
    pub fn common(id: &str, name: &str, shares: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: ShareClassKind::Common,
            shares,
            original_investment: Decimal::ZERO,
        }
    }

    pub fn option_pool(shares: u64) -> Self {
        Self {
            id: OPTION_POOL_ID.to_string(),
            name: OPTION_POOL_NAME.to_string(),
            kind: ShareClassKind::OptionPool,
            shares,
            original_investment: Decimal::ZERO,
        }
    }

    pub fn preferred(
        id: &str,
        name: &str,
        shares: u64,
        original_investment: Decimal,
        terms: PreferredTerms,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: ShareClassKind::Preferred(terms),
            shares,
            original_investment,
        }
    }

    pub fn preferred_terms(&self) -> Option<&PreferredTerms> {
        match &self.kind {
            ShareClassKind::Preferred(terms) => Some(terms),
            ShareClassKind::Common | ShareClassKind::OptionPool => None,
        }
    }

    pub fn is_preferred(&self) -> bool {
        self.preferred_terms().is_some()
    }

    /// Liquidation claim before any participation: `multiple × investment`.
    /// Zero for common and the pool.
    pub fn preference_amount(&self) -> Decimal {
        self.preferred_terms()
            .map(|terms| terms.liquidation_multiple.saturating_mul(self.original_investment))
            .unwrap_or(Decimal::ZERO)
    }

    /// Hard ceiling on the total payout of a capped participating class.
    pub fn payout_ceiling(&self) -> Option<Decimal> {
        match self.preferred_terms() {
            Some(PreferredTerms {
                participating: true,
                participation_cap: Some(cap),
                ..
            }) => Some(cap.saturating_mul(self.original_investment)),
            _ => None,
        }
    }

    /// Checks that the terms on a preferred class can be honoured.
    pub fn validate_terms(&self) -> Result<()> {
        let Some(terms) = self.preferred_terms() else {
            return Ok(());
        };
        if self.original_investment < Decimal::ZERO {
            return Err(Error::invalid_terms(&self.id, "original investment is negative"));
        }
        if terms.liquidation_multiple < Decimal::ZERO {
            return Err(Error::invalid_terms(&self.id, "liquidation multiple is negative"));
        }
        if terms
            .liquidation_multiple
            .checked_mul(self.original_investment)
            .is_none()
        {
            return Err(Error::invalid_terms(&self.id, "liquidation claim is out of range"));
        }
        if let Some(cap) = terms.participation_cap {
            if cap < terms.liquidation_multiple {
                return Err(Error::invalid_terms(
                    &self.id,
                    format!(
                        "participation cap {} is below the liquidation multiple {}",
                        cap, terms.liquidation_multiple
                    ),
                ));
            }
            if cap.checked_mul(self.original_investment).is_none() {
                return Err(Error::invalid_terms(&self.id, "participation ceiling is out of range"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HolderKind {
    Founder,
    Investor,
    OptionPool,
}

/// A founder, investor, or the option pool itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Holder {
    pub id: String,
    pub name: String,
    pub share_class_id: String,
    pub kind: HolderKind,
    pub shares: u64,
}

impl Holder {
    pub fn new(id: &str, name: &str, share_class_id: &str, kind: HolderKind, shares: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            share_class_id: share_class_id.to_string(),
            kind,
            shares,
        }
    }
}

/// One generation of the cap table. Applying a round never mutates a ledger;
/// it produces the next generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShareLedger {
    pub share_classes: Vec<ShareClass>,
    pub holders: Vec<Holder>,
    /// Index of the last round applied, `None` for the founding generation.
    #[serde(default)]
    pub last_round_index: Option<u32>,
}

impl ShareLedger {
    /// Builds a founding ledger, checking that every holder points at a known class
    /// and that holder shares add up to each class's total.
    pub fn new(share_classes: Vec<ShareClass>, holders: Vec<Holder>) -> Result<Self> {
        let ledger = Self {
            share_classes,
            holders,
            last_round_index: None,
        };
        ledger.verify_consistency()?;
        Ok(ledger)
    }

    /// Fully diluted share count: common, every preferred series and the unallocated pool.
    pub fn fully_diluted_shares(&self) -> u64 {
        self.share_classes
            .iter()
            .fold(0u64, |total, c| total.saturating_add(c.shares))
    }

    pub fn share_class(&self, class_id: &str) -> Option<&ShareClass> {
        self.share_classes.iter().find(|c| c.id == class_id)
    }

    pub fn holder(&self, holder_id: &str) -> Option<&Holder> {
        self.holders.iter().find(|h| h.id == holder_id)
    }

    pub fn option_pool(&self) -> Option<&ShareClass> {
        self.share_classes
            .iter()
            .find(|c| matches!(c.kind, ShareClassKind::OptionPool))
    }

    pub fn option_pool_shares(&self) -> u64 {
        self.option_pool().map(|c| c.shares).unwrap_or(0)
    }

    pub fn preferred_classes(&self) -> impl Iterator<Item = &ShareClass> {
        self.share_classes.iter().filter(|c| c.is_preferred())
    }

    /// Next generation with `additional` shares added to the unallocated pool.
    /// Creates the pool class and its holder when none exists yet.
    pub fn with_pool_top_up(&self, additional: u64) -> ShareLedger {
        let mut next = self.clone();
        if additional == 0 {
            return next;
        }

        match next
            .share_classes
            .iter_mut()
            .find(|c| matches!(c.kind, ShareClassKind::OptionPool))
        {
            Some(pool) => {
                pool.shares += additional;
                let pool_id = pool.id.clone();
                match next
                    .holders
                    .iter_mut()
                    .find(|h| h.share_class_id == pool_id)
                {
                    Some(holder) => holder.shares += additional,
                    None => next.holders.push(Holder::new(
                        OPTION_POOL_ID,
                        OPTION_POOL_NAME,
                        &pool_id,
                        HolderKind::OptionPool,
                        additional,
                    )),
                }
            }
            None => {
                next.share_classes.push(ShareClass::option_pool(additional));
                next.holders.push(Holder::new(
                    OPTION_POOL_ID,
                    OPTION_POOL_NAME,
                    OPTION_POOL_ID,
                    HolderKind::OptionPool,
                    additional,
                ));
            }
        }
        next
    }

    /// Next generation with a newly issued class and its sole holder.
    pub fn with_issued_class(&self, class: ShareClass, holder: Holder) -> ShareLedger {
        let mut next = self.clone();
        next.share_classes.push(class);
        next.holders.push(holder);
        next
    }

    /// Checks that class and holder ids are unique, that every holder points at
    /// a known class and that holder shares add up to each class's total.
    pub fn verify_consistency(&self) -> Result<()> {
        let mut class_ids: HashSet<&str> = HashSet::new();
        for class in &self.share_classes {
            if !class_ids.insert(class.id.as_str()) {
                return Err(ValidationError::InvalidInput(format!(
                    "Share class {} appears more than once",
                    class.id
                ))
                .into());
            }
        }
        let mut holder_ids: HashSet<&str> = HashSet::new();
        for holder in &self.holders {
            if !holder_ids.insert(holder.id.as_str()) {
                return Err(ValidationError::InvalidInput(format!(
                    "Holder {} appears more than once",
                    holder.id
                ))
                .into());
            }
        }

        let mut held: HashMap<&str, u64> = HashMap::new();
        for holder in &self.holders {
            if self.share_class(&holder.share_class_id).is_none() {
                return Err(ValidationError::InvalidInput(format!(
                    "Holder {} references unknown share class {}",
                    holder.id, holder.share_class_id
                ))
                .into());
            }
            let total = held.entry(holder.share_class_id.as_str()).or_insert(0);
            *total = total.saturating_add(holder.shares);
        }

        for class in &self.share_classes {
            let total = held.get(class.id.as_str()).copied().unwrap_or(0);
            if total != class.shares {
                return Err(ValidationError::InvalidInput(format!(
                    "Share class {} has {} shares but its holders own {}",
                    class.id, class.shares, total
                ))
                .into());
            }
        }
        Ok(())
    }
}
