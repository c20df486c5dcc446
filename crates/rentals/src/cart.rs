use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wardrobe_core::{
    Aggregate, AggregateRoot, CartId, CartItemId, DateRange, DomainError, ProductId, UserId,
};
use wardrobe_events::Event;

/// Something the user intends to rent; holds no inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub period: DateRange,
    pub quantity: u32,
    /// Daily price when the item was added, for display only.
    pub price_snapshot: Option<i64>,
    pub added_at: DateTime<Utc>,
}

/// Aggregate root: Cart (one per user, created on first use).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    user_id: Option<UserId>,
    items: Vec<CartItem>,
    version: u64,
    created: bool,
}

impl Cart {
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            user_id: None,
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CartId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, item_id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// Item with the same product and exact same dates, if any.
    pub fn matching_item(&self, product_id: ProductId, period: &DateRange) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|i| i.product_id == product_id && i.period == *period)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenCart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCart {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem.
///
/// `available` is the product's free unit count for `period`, computed by the
/// caller right before issuing the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub product_id: ProductId,
    pub period: DateRange,
    pub quantity: u32,
    pub price_snapshot: Option<i64>,
    pub available: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateQuantity.
///
/// `available` is only consulted when the quantity grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQuantity {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub quantity: u32,
    pub available: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClearCart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCart {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    OpenCart(OpenCart),
    AddItem(AddItem),
    UpdateQuantity(UpdateQuantity),
    RemoveItem(RemoveItem),
    ClearCart(ClearCart),
}

/// Event: CartOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartOpened {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub cart_id: CartId,
    pub item: CartItem,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemQuantityChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuantityChanged {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub previous_quantity: u32,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub cart_id: CartId,
    pub item_id: CartItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CartCleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleared {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    CartOpened(CartOpened),
    ItemAdded(ItemAdded),
    ItemQuantityChanged(ItemQuantityChanged),
    ItemRemoved(ItemRemoved),
    CartCleared(CartCleared),
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "rentals.cart.opened",
            CartEvent::ItemAdded(_) => "rentals.cart.item_added",
            CartEvent::ItemQuantityChanged(_) => "rentals.cart.quantity_changed",
            CartEvent::ItemRemoved(_) => "rentals.cart.item_removed",
            CartEvent::CartCleared(_) => "rentals.cart.cleared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartOpened(e) => e.occurred_at,
            CartEvent::ItemAdded(e) => e.occurred_at,
            CartEvent::ItemQuantityChanged(e) => e.occurred_at,
            CartEvent::ItemRemoved(e) => e.occurred_at,
            CartEvent::CartCleared(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::CartOpened(e) => {
                self.id = e.cart_id;
                self.user_id = Some(e.user_id);
                self.created = true;
            }
            CartEvent::ItemAdded(e) => {
                self.items.push(e.item.clone());
            }
            CartEvent::ItemQuantityChanged(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.id == e.item_id) {
                    item.quantity = e.quantity;
                }
            }
            CartEvent::ItemRemoved(e) => {
                self.items.retain(|i| i.id != e.item_id);
            }
            CartEvent::CartCleared(_) => {
                self.items.clear();
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::OpenCart(cmd) => self.handle_open(cmd),
            CartCommand::AddItem(cmd) => self.handle_add(cmd),
            CartCommand::UpdateQuantity(cmd) => self.handle_update(cmd),
            CartCommand::RemoveItem(cmd) => self.handle_remove(cmd),
            CartCommand::ClearCart(cmd) => self.handle_clear(cmd),
        }
    }
}

impl Cart {
    fn ensure_cart(&self, cart_id: CartId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("cart", cart_id));
        }
        if self.id != cart_id {
            return Err(DomainError::invariant("cart_id mismatch"));
        }
        Ok(())
    }

    fn existing_item(&self, item_id: CartItemId) -> Result<&CartItem, DomainError> {
        self.item(item_id)
            .ok_or_else(|| DomainError::not_found("cart item", item_id))
    }

    fn handle_open(&self, cmd: &OpenCart) -> Result<Vec<CartEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("cart already exists"));
        }
        Ok(vec![CartEvent::CartOpened(CartOpened {
            cart_id: cmd.cart_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add(&self, cmd: &AddItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        // Same product and dates merge; the combined quantity is what must fit.
        if let Some(existing) = self.matching_item(cmd.product_id, &cmd.period) {
            let combined = existing
                .quantity
                .checked_add(cmd.quantity)
                .ok_or_else(|| DomainError::validation("quantity too large"))?;
            if combined > cmd.available {
                return Err(DomainError::capacity(cmd.product_id, combined, cmd.available));
            }
            return Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
                cart_id: cmd.cart_id,
                item_id: existing.id,
                previous_quantity: existing.quantity,
                quantity: combined,
                occurred_at: cmd.occurred_at,
            })]);
        }

        if cmd.quantity > cmd.available {
            return Err(DomainError::capacity(cmd.product_id, cmd.quantity, cmd.available));
        }

        Ok(vec![CartEvent::ItemAdded(ItemAdded {
            cart_id: cmd.cart_id,
            item: CartItem {
                id: cmd.item_id,
                product_id: cmd.product_id,
                period: cmd.period,
                quantity: cmd.quantity,
                price_snapshot: cmd.price_snapshot,
                added_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateQuantity) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;
        if cmd.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let item = self.existing_item(cmd.item_id)?;
        if cmd.quantity == item.quantity {
            return Ok(vec![]);
        }
        if cmd.quantity > item.quantity {
            let available = cmd
                .available
                .ok_or_else(|| DomainError::invariant("increase requires a fresh availability count"))?;
            if cmd.quantity > available {
                return Err(DomainError::capacity(item.product_id, cmd.quantity, available));
            }
        }

        Ok(vec![CartEvent::ItemQuantityChanged(ItemQuantityChanged {
            cart_id: cmd.cart_id,
            item_id: cmd.item_id,
            previous_quantity: item.quantity,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveItem) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;
        self.existing_item(cmd.item_id)?;
        Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
            cart_id: cmd.cart_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_clear(&self, cmd: &ClearCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_cart(cmd.cart_id)?;
        if self.items.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::CartCleared(CartCleared {
            cart_id: cmd.cart_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
