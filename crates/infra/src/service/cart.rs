use serde_json::Value as JsonValue;

use wardrobe_core::{CartId, CartItemId, DateRange, DomainError, ProductId, UserId};
use wardrobe_events::{EventBus, EventEnvelope};
use wardrobe_rentals::{AddItem, Cart, CartCommand, ClearCart, OpenCart, RemoveItem, UpdateQuantity};

use super::{CART_AGGREGATE, Marketplace};
use crate::error::{ServiceError, ServiceResult};
use crate::store::Store;

impl<S, B> Marketplace<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// The user's cart, opened on first use.
    pub fn get_or_create_cart(&self, user_id: UserId) -> ServiceResult<Cart> {
        if let Some(cart) = self.store.cart_of_user(user_id)? {
            return Ok(cart);
        }

        let cart_id = CartId::new();
        let mut cart = Cart::empty(cart_id);
        let cmd = CartCommand::OpenCart(OpenCart {
            cart_id,
            user_id,
            occurred_at: self.now(),
        });
        match self.commit(CART_AGGREGATE, &mut cart, &cmd, |c, expected| {
            self.store.save_cart(c, expected)
        }) {
            Ok(_) => Ok(cart),
            // Someone else opened it first.
            Err(ServiceError::Domain(DomainError::Conflict(_))) => self
                .store
                .cart_of_user(user_id)?
                .ok_or_else(|| DomainError::not_found("cart of user", user_id).into()),
            Err(e) => Err(e),
        }
    }

    /// Put `quantity` units of a product for the given dates into the cart.
    ///
    /// Same product and dates merge into one item; the merged quantity is what
    /// has to be available. Reserves nothing.
    #[tracing::instrument(skip(self))]
    pub fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        start: &str,
        end: &str,
    ) -> ServiceResult<Cart> {
        let period = DateRange::parse(start, end)?;
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive").into());
        }

        let product = self.product(product_id)?;
        if !product.is_rentable() {
            return Err(DomainError::validation(format!("product {product_id} is not rentable")).into());
        }
        let available = self.count_free(product_id, &period)?;

        let mut cart = self.get_or_create_cart(user_id)?;
        let cmd = CartCommand::AddItem(AddItem {
            cart_id: cart.id_typed(),
            item_id: CartItemId::new(),
            product_id,
            period,
            quantity,
            price_snapshot: Some(product.base_daily_price()),
            available,
            occurred_at: self.now(),
        });
        self.commit(CART_AGGREGATE, &mut cart, &cmd, |c, expected| {
            self.store.save_cart(c, expected)
        })
        .inspect_err(|e| {
            if e.is_capacity() {
                tracing::debug!(%product_id, quantity, available, "not enough units for cart item");
            }
        })?;
        Ok(cart)
    }

    /// Increases are checked against a fresh count, decreases are not.
    pub fn update_quantity(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: u32,
    ) -> ServiceResult<Cart> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive").into());
        }
        let mut cart = self.existing_cart(user_id)?;
        let item = cart
            .item(item_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("cart item", item_id))?;

        let available = if quantity > item.quantity {
            Some(self.count_free(item.product_id, &item.period)?)
        } else {
            None
        };

        let cmd = CartCommand::UpdateQuantity(UpdateQuantity {
            cart_id: cart.id_typed(),
            item_id,
            quantity,
            available,
            occurred_at: self.now(),
        });
        self.commit(CART_AGGREGATE, &mut cart, &cmd, |c, expected| {
            self.store.save_cart(c, expected)
        })
        .inspect_err(|e| {
            if e.is_capacity() {
                tracing::debug!(product_id = %item.product_id, quantity, "not enough units for new quantity");
            }
        })?;
        Ok(cart)
    }

    pub fn remove_item(&self, user_id: UserId, item_id: CartItemId) -> ServiceResult<Cart> {
        let mut cart = self.existing_cart(user_id)?;
        let cmd = CartCommand::RemoveItem(RemoveItem {
            cart_id: cart.id_typed(),
            item_id,
            occurred_at: self.now(),
        });
        self.commit(CART_AGGREGATE, &mut cart, &cmd, |c, expected| {
            self.store.save_cart(c, expected)
        })?;
        Ok(cart)
    }

    pub fn clear_cart(&self, user_id: UserId) -> ServiceResult<Cart> {
        let mut cart = self.get_or_create_cart(user_id)?;
        let cmd = CartCommand::ClearCart(ClearCart {
            cart_id: cart.id_typed(),
            occurred_at: self.now(),
        });
        self.commit(CART_AGGREGATE, &mut cart, &cmd, |c, expected| {
            self.store.save_cart(c, expected)
        })?;
        Ok(cart)
    }

    fn existing_cart(&self, user_id: UserId) -> ServiceResult<Cart> {
        self.store
            .cart_of_user(user_id)?
            .ok_or_else(|| DomainError::not_found("cart of user", user_id).into())
    }
}
