//! Catalog domain module: products, their physical assets and manual holds.
//!
//! Business rules only (no IO, no storage). Catalog CRUD itself is owned by an
//! external service; the booking core reads prices, suppliers and asset rows.

pub mod asset;
pub mod blocked_period;
pub mod product;

pub use asset::{
    AssetCommand, AssetEvent, AssetRegistered, AssetStatus, AssetStatusChanged, Asset,
    AttachPhoto, ChangeAssetStatus, ConditionGrade, RegisterAsset, RegradeAsset,
};
pub use blocked_period::BlockedPeriod;
pub use product::{
    ActivateProduct, ChangeDailyPrice, CreateProduct, DeactivateProduct, Product, ProductCommand,
    ProductCreated, ProductEvent, ProductStatus,
};
