//! Session-backed cart of a guest.
//!
//! The session holds one JSON object under [`SESSION_CART_KEY`] mapping the
//! product ID, as a string, to the quantity asked for:
//!
//! ```json
//! {"12": 2, "40": 1}
//! ```
//!
//! Sessions are client-influenced, so reading is lenient: keys that aren't
//! IDs and quantities that aren't positive integers are skipped.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tower_sessions::Session;
use tracing::debug;

use evault_core::ProductId;

use super::{CartError, CartSource, Shopper};
use crate::models::CartEntry;

/// Default session key of the guest cart.
pub const SESSION_CART_KEY: &str = "cart";

/// Raw session cart: product ID string to quantity.
pub type SessionCart = BTreeMap<String, Value>;

/// Read and write access to the session cart map.
pub trait SessionCartStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The stored map, or an empty one if there is none.
    fn load(&self) -> impl Future<Output = Result<SessionCart, Self::Error>> + Send;

    fn replace(&self, cart: SessionCart) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Session cart kept in memory. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    cart: Arc<Mutex<SessionCart>>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing raw map.
    #[must_use]
    pub fn with_cart(cart: SessionCart) -> Self {
        Self {
            cart: Arc::new(Mutex::new(cart)),
        }
    }

    /// Copy of the raw map.
    pub async fn snapshot(&self) -> SessionCart {
        self.cart.lock().await.clone()
    }
}

impl SessionCartStore for MemorySession {
    type Error = Infallible;

    async fn load(&self) -> Result<SessionCart, Infallible> {
        Ok(self.snapshot().await)
    }

    async fn replace(&self, cart: SessionCart) -> Result<(), Infallible> {
        *self.cart.lock().await = cart;
        Ok(())
    }

    async fn clear(&self) -> Result<(), Infallible> {
        self.cart.lock().await.clear();
        Ok(())
    }
}

/// Session cart stored in a `tower_sessions` session.
#[derive(Debug, Clone)]
pub struct TowerSessionCart {
    session: Session,
    key: String,
}

impl TowerSessionCart {
    /// Use the default [`SESSION_CART_KEY`].
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_key(session, SESSION_CART_KEY)
    }

    #[must_use]
    pub fn with_key(session: Session, key: impl Into<String>) -> Self {
        Self {
            session,
            key: key.into(),
        }
    }
}

impl SessionCartStore for TowerSessionCart {
    type Error = tower_sessions::session::Error;

    async fn load(&self) -> Result<SessionCart, Self::Error> {
        let Some(value) = self.session.get_value(&self.key).await? else {
            return Ok(SessionCart::new());
        };
        Ok(serde_json::from_value(value).unwrap_or_else(|e| {
            debug!(error = %e, "Ignoring malformed session cart");
            SessionCart::new()
        }))
    }

    async fn replace(&self, cart: SessionCart) -> Result<(), Self::Error> {
        self.session.insert(&self.key, cart).await
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        self.session.remove_value(&self.key).await.map(|_| ())
    }
}

/// A guest's cart on top of a [`SessionCartStore`].
#[derive(Debug, Clone)]
pub struct EphemeralCart<T> {
    store: T,
}

impl<T: SessionCartStore> EphemeralCart<T> {
    #[must_use]
    pub const fn new(store: T) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &T {
        &self.store
    }

    async fn load(&self) -> Result<SessionCart, CartError> {
        self.store.load().await.map_err(session_error)
    }

    async fn replace(&self, cart: SessionCart) -> Result<(), CartError> {
        self.store.replace(cart).await.map_err(session_error)
    }
}

fn session_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> CartError {
    CartError::Session(Box::new(e))
}

/// Parse one raw entry, or `None` if it can't be used.
fn parse_entry(key: &str, value: &Value) -> Option<CartEntry> {
    let Ok(product_id) = key.parse::<ProductId>() else {
        debug!(key, "Dropping session cart entry with invalid product id");
        return None;
    };
    let quantity = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .and_then(|q| u32::try_from(q).ok())
    .filter(|q| *q > 0);

    let Some(quantity) = quantity else {
        debug!(%product_id, %value, "Dropping session cart entry with invalid quantity");
        return None;
    };
    Some(CartEntry::new(product_id, quantity))
}

impl<T: SessionCartStore> CartSource for EphemeralCart<T> {
    fn shopper(&self) -> Shopper {
        Shopper::Guest
    }

    /// Entries in ascending product ID order.
    async fn lines(&self) -> Result<Vec<CartEntry>, CartError> {
        let raw = self.load().await?;
        let mut entries: Vec<CartEntry> = raw
            .iter()
            .filter_map(|(key, value)| parse_entry(key, value))
            .collect();
        entries.sort_by_key(|e| e.product_id);
        entries.dedup_by_key(|e| e.product_id);
        Ok(entries)
    }

    async fn add_or_update(&self, product: ProductId, quantity: u32) -> Result<(), CartError> {
        let mut raw = self.load().await?;
        // " 7" and "7" name the same product
        raw.retain(|key, _| key.parse::<ProductId>().ok() != Some(product));
        if quantity > 0 {
            raw.insert(product.to_string(), Value::from(quantity));
        }
        self.replace(raw).await
    }

    async fn remove(&self, product: ProductId) -> Result<(), CartError> {
        self.add_or_update(product, 0).await
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.store.clear().await.map_err(session_error)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> SessionCart {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_lenient_parsing() {
        let session = MemorySession::with_cart(raw(json!({
            "12": 2,
            "abc": 1,
            "5": 0,
            "7": -3,
            "9": "4",
            "3": 1.5,
            "40": 1
        })));
        let cart = EphemeralCart::new(session);

        assert_eq!(
            cart.lines().await.unwrap(),
            vec![
                CartEntry::new(ProductId::new(9), 4),
                CartEntry::new(ProductId::new(12), 2),
                CartEntry::new(ProductId::new(40), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_add_or_update_writes_string_keys() {
        let session = MemorySession::new();
        let cart = EphemeralCart::new(session.clone());
        cart.add_or_update(ProductId::new(12), 3).await.unwrap();
        cart.add_or_update(ProductId::new(4), 1).await.unwrap();
        cart.add_or_update(ProductId::new(12), 5).await.unwrap();

        assert_eq!(session.snapshot().await, raw(json!({"12": 5, "4": 1})));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let session = MemorySession::with_cart(raw(json!({"1": 1, "2": 2})));
        let cart = EphemeralCart::new(session.clone());

        cart.remove(ProductId::new(1)).await.unwrap();
        assert_eq!(session.snapshot().await, raw(json!({"2": 2})));

        cart.clear().await.unwrap();
        assert!(cart.lines().await.unwrap().is_empty());
        assert_eq!(cart.shopper(), Shopper::Guest);
    }
}
