//! Staff order commands.

use evault_checkout::admin::OrderAdmin;
use evault_checkout::db::PgStore;
use evault_core::{OrderId, OrderStatus};

use super::print_json;

/// Print an order with its lines and delivery address.
///
/// # Errors
///
/// Returns an error if the order doesn't exist or the store fails.
pub async fn show(store: &PgStore, id: OrderId) -> Result<(), Box<dyn std::error::Error>> {
    let details = OrderAdmin::new(store).details(id).await?;
    print_json(&details)?;
    Ok(())
}

/// Move an order forward and print it.
///
/// # Errors
///
/// Returns an error for a backwards move, a concurrent change, a bad
/// tracking link or a store failure.
pub async fn advance(
    store: &PgStore,
    id: OrderId,
    status: OrderStatus,
    tracking: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let order = OrderAdmin::new(store).advance(id, status, tracking).await?;
    print_json(&order)?;
    Ok(())
}
