use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wardrobe_core::{Aggregate, AggregateRoot, CategoryId, DomainError, ProductId, SupplierId};
use wardrobe_events::Event;

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
}

/// Aggregate root: Product (a catalog entry owning many physical assets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    supplier_id: Option<SupplierId>,
    category_id: Option<CategoryId>,
    title: String,
    description: String,
    /// Price per day in smallest currency unit.
    base_daily_price: i64,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            supplier_id: None,
            category_id: None,
            title: String::new(),
            description: String::new(),
            base_daily_price: 0,
            status: ProductStatus::Inactive,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn base_daily_price(&self) -> i64 {
        self.base_daily_price
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Only active products can be put in a cart or booked.
    pub fn is_rentable(&self) -> bool {
        self.created && self.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub base_daily_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeDailyPrice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDailyPrice {
    pub product_id: ProductId,
    pub base_daily_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ActivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ChangeDailyPrice(ChangeDailyPrice),
    DeactivateProduct(DeactivateProduct),
    ActivateProduct(ActivateProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub base_daily_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DailyPriceChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPriceChanged {
    pub product_id: ProductId,
    pub previous_price: i64,
    pub base_daily_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeactivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductActivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    DailyPriceChanged(DailyPriceChanged),
    ProductDeactivated(ProductDeactivated),
    ProductActivated(ProductActivated),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::DailyPriceChanged(_) => "catalog.product.price_changed",
            ProductEvent::ProductDeactivated(_) => "catalog.product.deactivated",
            ProductEvent::ProductActivated(_) => "catalog.product.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::DailyPriceChanged(e) => e.occurred_at,
            ProductEvent::ProductDeactivated(e) => e.occurred_at,
            ProductEvent::ProductActivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.supplier_id = Some(e.supplier_id);
                self.category_id = Some(e.category_id);
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.base_daily_price = e.base_daily_price;
                self.status = ProductStatus::Active;
                self.created = true;
            }
            ProductEvent::DailyPriceChanged(e) => {
                self.base_daily_price = e.base_daily_price;
            }
            ProductEvent::ProductDeactivated(_) => {
                self.status = ProductStatus::Inactive;
            }
            ProductEvent::ProductActivated(_) => {
                self.status = ProductStatus::Active;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::ChangeDailyPrice(cmd) => self.handle_change_price(cmd),
            ProductCommand::DeactivateProduct(cmd) => self.handle_deactivate(cmd),
            ProductCommand::ActivateProduct(cmd) => self.handle_activate(cmd),
        }
    }
}

impl Product {
    fn ensure_exists(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("product", product_id));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.base_daily_price <= 0 {
            return Err(DomainError::validation("base daily price must be positive"));
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            supplier_id: cmd.supplier_id,
            category_id: cmd.category_id,
            title: cmd.title.trim().to_string(),
            description: cmd.description.clone(),
            base_daily_price: cmd.base_daily_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_price(&self, cmd: &ChangeDailyPrice) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        if cmd.base_daily_price <= 0 {
            return Err(DomainError::validation("base daily price must be positive"));
        }
        if cmd.base_daily_price == self.base_daily_price {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::DailyPriceChanged(DailyPriceChanged {
            product_id: cmd.product_id,
            previous_price: self.base_daily_price,
            base_daily_price: cmd.base_daily_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        match self.status {
            ProductStatus::Active => Ok(vec![ProductEvent::ProductDeactivated(ProductDeactivated {
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })]),
            ProductStatus::Inactive => Err(DomainError::transition("product", "inactive", "deactivate")),
        }
    }

    fn handle_activate(&self, cmd: &ActivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        match self.status {
            ProductStatus::Inactive => Ok(vec![ProductEvent::ProductActivated(ProductActivated {
                product_id: cmd.product_id,
                occurred_at: cmd.occurred_at,
            })]),
            ProductStatus::Active => Err(DomainError::transition("product", "active", "activate")),
        }
    }
}
