//! Price products without placing an order.

use evault_checkout::CheckoutOrchestrator;
use evault_checkout::db::PgStore;
use evault_checkout::models::CartEntry;
use evault_core::{Money, ProductId};

use super::print_json;

/// Parse a `PRODUCT_ID:QUANTITY` argument.
///
/// # Errors
///
/// Returns a message naming the malformed part.
pub fn parse_entry(s: &str) -> Result<CartEntry, String> {
    let (id, quantity) = s
        .split_once(':')
        .ok_or_else(|| format!("expected PRODUCT_ID:QUANTITY, got {s:?}"))?;
    let id: ProductId = id.parse().map_err(|e| format!("{e}"))?;
    let quantity: u32 = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity: {quantity:?}"))?;
    if quantity == 0 {
        return Err("quantity must be at least 1".to_owned());
    }
    Ok(CartEntry::new(id, quantity))
}

/// Quote `entries` and print the breakdown as JSON.
///
/// # Errors
///
/// Returns an error for unknown products, a refused coupon or a store failure.
pub async fn run(
    store: PgStore,
    entries: &[CartEntry],
    coupon: Option<&str>,
    delivery_charge: Option<Money>,
) -> Result<(), Box<dyn std::error::Error>> {
    let quote = CheckoutOrchestrator::new(store)
        .with_delivery_charge(delivery_charge)
        .quote_entries(entries, coupon)
        .await?;
    if quote.lines.len() < entries.len() {
        tracing::warn!(
            requested = entries.len(),
            priced = quote.lines.len(),
            "Some products were not found and were left out"
        );
    }
    print_json(&quote)?;
    Ok(())
}
