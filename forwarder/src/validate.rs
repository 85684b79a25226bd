//! Input validation for forwarded ports and LAN target addresses
//!
//! Both predicates are pure: they only inspect their argument.

use regex::Regex;
use std::sync::LazyLock;

/// Lowest external port we are willing to forward.
/// Anything below is treated as a "known port".
pub const MIN_EXTERNAL_PORT: u32 = 1000;

/// Only the two RDP host subnets may receive forwards.
static LOCAL_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^192\.168\.[23]\.([0-9]+)$").expect("static regex"));

/// Errors raised when operator input fails validation.
///
/// The Display text is the exact message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("That's not a valid tcp port!")]
    InvalidPort(String),

    #[error("Please do not use \"known ports\".")]
    KnownPort(String),

    #[error("That's not a valid local IP!")]
    InvalidAddress(String),
}

/// True unless `port` is an integer of at least [`MIN_EXTERNAL_PORT`].
///
/// The integer is unbounded: any digit string past the threshold passes.
pub fn is_invalid_port(port: &str) -> bool {
    let port = port.trim();
    let (negative, digits) = match port.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, port.strip_prefix('+').unwrap_or(port)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    if negative {
        return true;
    }

    let significant = digits.trim_start_matches('0');
    // five or more significant digits are always >= 10000
    if significant.len() > 4 {
        return false;
    }
    significant.parse::<u32>().unwrap_or(0) < MIN_EXTERNAL_PORT
}

/// True unless `addr` is `192.168.2.<n>` or `192.168.3.<n>` with `n <= 255`.
pub fn is_invalid_address(addr: &str) -> bool {
    let Some(caps) = LOCAL_ADDRESS.captures(addr) else {
        return true;
    };
    match caps[1].parse::<u32>() {
        Ok(octet) => octet > 255,
        Err(_) => true,
    }
}

/// Port check for deletion flags.
pub fn check_port(port: &str) -> Result<(), ValidationError> {
    if is_invalid_port(port) {
        return Err(ValidationError::InvalidPort(port.to_string()));
    }
    Ok(())
}

/// Port check for new forwards, which reports a known-port refusal.
pub fn check_new_port(port: &str) -> Result<(), ValidationError> {
    if is_invalid_port(port) {
        return Err(ValidationError::KnownPort(port.to_string()));
    }
    Ok(())
}

pub fn check_address(addr: &str) -> Result<(), ValidationError> {
    if is_invalid_address(addr) {
        return Err(ValidationError::InvalidAddress(addr.to_string()));
    }
    Ok(())
}
