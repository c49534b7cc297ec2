use super::{Amount, CardNumber, Pin};

pub type AccountId = i64;

/// A stored card account as read back from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub card_number: String,
    pub pin: String,
    pub balance: Amount,
}

impl Account {
    /// Exact, case-sensitive comparison against the stored PIN.
    pub fn pin_matches(&self, candidate: &str) -> bool {
        self.pin == candidate
    }
}

/// Credentials handed to the customer when a card is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCard {
    pub id: AccountId,
    pub card_number: CardNumber,
    pub pin: Pin,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(pin: &str) -> Account {
        Account {
            id: 1,
            card_number: "4000001234567899".into(),
            pin: pin.into(),
            balance: 0,
        }
    }

    #[test]
    fn test_pin_matches_exactly() {
        let acc = account("0420");
        assert!(acc.pin_matches("0420"));
        assert!(!acc.pin_matches("0421"));
        assert!(!acc.pin_matches("420"));
        assert!(!acc.pin_matches("0420 "));
    }
}
