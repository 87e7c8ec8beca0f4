use crate::utils::error::{Result, TicketError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Money(pub i64);

impl Money {
    pub fn cents(self) -> i64 {
        self.0
    }

    /// Parses amounts like `14.50`, `$1,204.00`, `-3`, `(12.00)`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| TicketError::InvalidMoney {
            value: input.to_string(),
            reason: reason.to_string(),
        };

        let mut text = input.trim();
        let mut negative = false;
        if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            negative = true;
            text = inner.trim();
        }
        if let Some(rest) = text.strip_prefix('-') {
            if negative {
                return Err(invalid("sign given twice"));
            }
            negative = true;
            text = rest.trim_start();
        }
        let text = text.trim_start_matches(['$', '€', '£']).trim();

        let digits: String = text.chars().filter(|c| *c != ',').collect();
        if digits.is_empty() {
            return Err(invalid("no digits"));
        }

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits.as_str(), ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("unexpected character"));
        }
        if fraction.len() > 2 {
            return Err(invalid("more than two decimal places"));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("amount too large"))?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().unwrap_or(0) * 10,
            _ => fraction.parse::<i64>().unwrap_or(0),
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(|| invalid("amount too large"))?;
        Ok(Money(if negative { -cents } else { cents }))
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// `quantity × self`, rounded half away from zero to whole cents.
    /// `None` when the result does not fit.
    pub fn times(self, quantity: Quantity) -> Option<Money> {
        let product = i128::from(self.0) * i128::from(quantity.mantissa);
        let divisor = 10i128.pow(quantity.scale);
        let quotient = product / divisor;
        let remainder = product % divisor;
        let rounded = if remainder.abs() * 2 >= divisor {
            quotient + product.signum()
        } else {
            quotient
        };
        i64::try_from(rounded).ok().map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let whole = (abs / 100).to_string();
        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, c) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, grouped, abs % 100)
    }
}

const MAX_QUANTITY_SCALE: u32 = 9;

/// An exact decimal quantity, `mantissa / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    mantissa: i64,
    scale: u32,
}

/// Parses a quantity cell such as `2`, `1.5` or `1,200.125`; thousands separators are ignored.
pub fn parse_quantity(input: &str) -> Option<Quantity> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let scale = u32::try_from(fraction.len()).ok().filter(|s| *s <= MAX_QUANTITY_SCALE)?;
    let mantissa: i64 = format!("{}{}", whole, fraction).parse().ok()?;
    Some(Quantity {
        mantissa: if negative { -mantissa } else { mantissa },
        scale,
    })
}
