use alloy_primitives::Address;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Mint,
    Burn,
    Transfer,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Mint => "MINT",
            Action::Burn => "BURN",
            Action::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MINT" => Ok(Action::Mint),
            "BURN" => Ok(Action::Burn),
            "TRANSFER" => Ok(Action::Transfer),
            other => Err(format!(
                "Unknown action '{other}'. Valid options: MINT, BURN, TRANSFER"
            )),
        }
    }
}

/// Classifies a transfer by the zero-address convention. A mint wins when both
/// sides are zero.
pub fn classify(from: Address, to: Address) -> Action {
    if from == Address::ZERO {
        Action::Mint
    } else if to == Address::ZERO {
        Action::Burn
    } else {
        Action::Transfer
    }
}
