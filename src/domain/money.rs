use std::fmt;

/// Amounts are integer base units (wei) to avoid floating-point precision issues.
/// One ether is 10^18 wei, so 1.5 ether = 1_500_000_000_000_000_000 wei.
pub type Wei = u128;

/// Number of fractional digits in one ether.
pub const ETHER_DECIMALS: usize = 18;

/// Base units in one ether.
pub const WEI_PER_ETHER: Wei = 1_000_000_000_000_000_000;

/// Format wei as a human-readable ether string.
/// Example: 1500000000000000000 -> "1.5", 2000000000000000000 -> "2.0", 1 -> "0.000000000000000001"
pub fn format_ether(wei: Wei) -> String {
    let units = wei / WEI_PER_ETHER;
    let remainder = wei % WEI_PER_ETHER;
    if remainder == 0 {
        return format!("{}.0", units);
    }
    let fraction = format!("{:0width$}", remainder, width = ETHER_DECIMALS);
    format!("{}.{}", units, fraction.trim_end_matches('0'))
}

/// Parse a decimal ether string into wei.
/// Example: "1.0" -> 10^18, "0.5" -> 5 * 10^17, "2" -> 2 * 10^18
pub fn parse_ether(input: &str) -> Result<Wei, ParseEtherError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParseEtherError::Negative);
    }

    let (units_str, fraction_str) = match input.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (input, ""),
    };
    if units_str.is_empty() && fraction_str.is_empty() {
        return Err(ParseEtherError::InvalidFormat);
    }
    if !units_str.chars().all(|c| c.is_ascii_digit())
        || !fraction_str.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseEtherError::InvalidFormat);
    }
    if fraction_str.len() > ETHER_DECIMALS {
        return Err(ParseEtherError::TooManyDecimals);
    }

    let units: Wei = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseEtherError::InvalidFormat)?
    };

    // Right-pad the fraction so "5" means 5 * 10^17
    let fraction: Wei = if fraction_str.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction_str, width = ETHER_DECIMALS)
            .parse()
            .map_err(|_| ParseEtherError::InvalidFormat)?
    };

    units
        .checked_mul(WEI_PER_ETHER)
        .and_then(|wei| wei.checked_add(fraction))
        .ok_or(ParseEtherError::Overflow)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEtherError {
    InvalidFormat,
    Negative,
    TooManyDecimals,
    Overflow,
}

impl fmt::Display for ParseEtherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseEtherError::InvalidFormat => write!(f, "invalid amount format"),
            ParseEtherError::Negative => write!(f, "amount cannot be negative"),
            ParseEtherError::TooManyDecimals => {
                write!(f, "amount has more than {} decimal places", ETHER_DECIMALS)
            }
            ParseEtherError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseEtherError {}
