//! Money primitives: supported currencies and non-negative decimal amounts.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Currencies a wallet can be held in.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    /// Every supported currency, in reporting order.
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Jpy];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            _ => Err(DomainError::validation(
                "Invalid currency: must be USD, EUR, GBP, or JPY",
            )),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_string()
    }
}

/// A non-negative decimal amount of money.
///
/// The inner value is always >= 0; a wallet balance built from `Amount`s can
/// therefore never go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Accepts zero and positive values.
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation(format!(
                "amount cannot be negative: {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Accepts strictly positive values (movement amounts).
    pub fn positive(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation(
                "Invalid amount: must be a positive number",
            ));
        }
        Ok(Self(value))
    }

    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// `None` when the result would be negative.
    pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
        let result = self.0.checked_sub(other.0)?;
        if result < Decimal::ZERO {
            None
        } else {
            Some(Amount(result))
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(value: Amount) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(Amount::new(dec!(-0.01)).is_err());
        assert_eq!(Amount::new(dec!(0)).unwrap(), Amount::ZERO);
    }

    #[test]
    fn movement_amounts_must_be_positive() {
        assert!(Amount::positive(dec!(0)).is_err());
        assert!(Amount::positive(dec!(-5)).is_err());
        assert_eq!(Amount::positive(dec!(12.5)).unwrap().value(), dec!(12.5));
    }

    #[test]
    fn checked_sub_refuses_to_go_below_zero() {
        let ten = Amount::new(dec!(10)).unwrap();
        let eleven = Amount::new(dec!(11)).unwrap();
        assert_eq!(ten.checked_sub(eleven), None);
        assert_eq!(eleven.checked_sub(ten).unwrap().value(), dec!(1));
    }

    #[test]
    fn currency_codes_parse_and_unknown_codes_fail() {
        assert_eq!("EUR".parse::<Currency>().unwrap(), Currency::Eur);
        let err = "CHF".parse::<Currency>().unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("Invalid currency: must be USD, EUR, GBP, or JPY")
        );
    }

    #[test]
    fn currency_serializes_as_code() {
        let json = serde_json::to_string(&Currency::Gbp).unwrap();
        assert_eq!(json, "\"GBP\"");
        let back: Currency = serde_json::from_str("\"JPY\"").unwrap();
        assert_eq!(back, Currency::Jpy);
        assert!(serde_json::from_str::<Currency>("\"usd\"").is_err());
    }

    #[test]
    fn amount_deserialization_enforces_non_negative() {
        assert!(serde_json::from_str::<Amount>("\"-1\"").is_err());
        let amount: Amount = serde_json::from_str("\"2.50\"").unwrap();
        assert_eq!(amount.value(), dec!(2.50));
    }
}
