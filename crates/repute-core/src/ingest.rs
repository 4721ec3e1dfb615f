//! Ingestion-time parsing of raw collaborator output.
//!
//! Converts benchmark-tool duration strings and offer payment properties into
//! typed values. Every failure is a recoverable [`IngestError`] that rejects
//! the single sample or property; nothing here panics on bad input.

use tracing::debug;

use crate::error::IngestError;
use crate::types::{NodeId, PaymentAddresses, PaymentPlatform, Provider, Timestamp, WalletAddress};

/// Offer property holding the provider's human-readable name.
pub const NODE_NAME_PROPERTY: &str = "golem.node.id.name";

/// Parse a benchmark or probe duration into whole milliseconds.
///
/// Accepts space-separated parts, each a non-negative decimal number followed
/// by `ms`, `s` or `m`. Parts are summed and the total is rounded to the
/// nearest millisecond.
///
/// # Examples
///
/// ```
/// use repute_core::ingest::parse_duration_ms;
///
/// assert_eq!(parse_duration_ms("1500ms").unwrap(), 1500);
/// assert_eq!(parse_duration_ms("2s").unwrap(), 2000);
/// assert_eq!(parse_duration_ms("1s 250ms").unwrap(), 1250);
/// assert_eq!(parse_duration_ms("10.0021s").unwrap(), 10_002);
/// assert!(parse_duration_ms("fast").is_err());
/// ```
pub fn parse_duration_ms(raw: &str) -> Result<u64, IngestError> {
    let invalid = || IngestError::InvalidDuration(raw.to_string());

    let mut total_ms = 0f64;
    let mut parts = 0usize;
    for part in raw.split_whitespace() {
        // "ms" must be checked before "s" and "m".
        let (number, scale) = if let Some(n) = part.strip_suffix("ms") {
            (n, 1.0)
        } else if let Some(n) = part.strip_suffix('s') {
            (n, 1_000.0)
        } else if let Some(n) = part.strip_suffix('m') {
            (n, 60_000.0)
        } else {
            return Err(invalid());
        };

        let value: f64 = number.parse().map_err(|_| invalid())?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }
        total_ms += value * scale;
        parts += 1;
    }

    if parts == 0 || total_ms > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(total_ms.round() as u64)
}

/// Extract the payment addresses from raw offer properties.
///
/// Only keys of the form `golem.com.payment.platform.<platform>.address` are
/// considered. Platforms outside [`PaymentPlatform`] are skipped; a malformed
/// address on a known platform rejects the whole set.
pub fn parse_payment_addresses<'a, I>(properties: I) -> Result<PaymentAddresses, IngestError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut addresses = PaymentAddresses::new();
    for (key, value) in properties {
        if !key.starts_with("golem.com.payment.platform.") || !key.ends_with(".address") {
            continue;
        }
        match PaymentPlatform::from_property_key(key) {
            Ok(platform) => addresses.insert(platform, WalletAddress::parse(value)?),
            Err(e) => debug!(%e, "ingest: skipping payment platform"),
        }
    }
    Ok(addresses)
}

/// Build a [`Provider`] from a node id and its raw offer properties.
///
/// The provider's network is derived from its payment platforms.
pub fn provider_from_offer<'a, I>(
    node_id: &str,
    created_at: Timestamp,
    properties: I,
) -> Result<Provider, IngestError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let id = NodeId::parse(node_id)?;
    let mut name = None;
    let mut payment = Vec::new();
    for (key, value) in properties {
        if key == NODE_NAME_PROPERTY {
            name = Some(value.to_string());
        } else {
            payment.push((key, value));
        }
    }
    let addresses = parse_payment_addresses(payment)?;
    Ok(Provider::new(id, name, created_at, addresses))
}
