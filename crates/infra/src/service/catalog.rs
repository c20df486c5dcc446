//! Catalog writes the booking core needs for seeding and asset upkeep.

use serde_json::Value as JsonValue;

use wardrobe_catalog::{
    ActivateProduct, Asset, AssetCommand, AssetStatus, AttachPhoto, ChangeAssetStatus,
    ChangeDailyPrice, ConditionGrade, CreateProduct, DeactivateProduct, Product, ProductCommand,
    RegisterAsset,
};
use wardrobe_core::{AssetId, CategoryId, DomainError, ProductId, SupplierId};
use wardrobe_events::{EventBus, EventEnvelope};

use super::{ASSET_AGGREGATE, Marketplace, PRODUCT_AGGREGATE};
use crate::error::ServiceResult;
use crate::store::Store;

impl<S, B> Marketplace<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    #[tracing::instrument(skip(self, description))]
    pub fn create_product(
        &self,
        supplier_id: SupplierId,
        category_id: CategoryId,
        title: &str,
        description: &str,
        base_daily_price: i64,
    ) -> ServiceResult<Product> {
        let product_id = ProductId::new();
        let mut product = Product::empty(product_id);
        let cmd = ProductCommand::CreateProduct(CreateProduct {
            product_id,
            supplier_id,
            category_id,
            title: title.to_string(),
            description: description.to_string(),
            base_daily_price,
            occurred_at: self.now(),
        });
        self.commit(PRODUCT_AGGREGATE, &mut product, &cmd, |p, expected| {
            self.store.save_product(p, expected)
        })?;
        tracing::info!(%product_id, "product created");
        Ok(product)
    }

    pub fn product(&self, product_id: ProductId) -> ServiceResult<Product> {
        self.store
            .product(product_id)?
            .ok_or_else(|| DomainError::not_found("product", product_id).into())
    }

    pub fn change_daily_price(
        &self,
        product_id: ProductId,
        base_daily_price: i64,
    ) -> ServiceResult<Product> {
        let mut product = self.product(product_id)?;
        let cmd = ProductCommand::ChangeDailyPrice(ChangeDailyPrice {
            product_id,
            base_daily_price,
            occurred_at: self.now(),
        });
        self.commit(PRODUCT_AGGREGATE, &mut product, &cmd, |p, expected| {
            self.store.save_product(p, expected)
        })?;
        Ok(product)
    }

    /// Take a product off the catalog (or put it back). Existing bookings are
    /// not touched; new cart items are refused while it is inactive.
    pub fn set_product_active(&self, product_id: ProductId, active: bool) -> ServiceResult<Product> {
        let mut product = self.product(product_id)?;
        let occurred_at = self.now();
        let cmd = if active {
            ProductCommand::ActivateProduct(ActivateProduct {
                product_id,
                occurred_at,
            })
        } else {
            ProductCommand::DeactivateProduct(DeactivateProduct {
                product_id,
                occurred_at,
            })
        };
        self.commit(PRODUCT_AGGREGATE, &mut product, &cmd, |p, expected| {
            self.store.save_product(p, expected)
        })?;
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub fn register_asset(
        &self,
        product_id: ProductId,
        asset_code: &str,
        condition_grade: ConditionGrade,
    ) -> ServiceResult<Asset> {
        self.product(product_id)?;

        let asset_id = AssetId::new();
        let mut asset = Asset::empty(asset_id);
        let cmd = AssetCommand::RegisterAsset(RegisterAsset {
            asset_id,
            product_id,
            asset_code: asset_code.to_string(),
            condition_grade,
            occurred_at: self.now(),
        });
        self.commit(ASSET_AGGREGATE, &mut asset, &cmd, |a, expected| {
            self.store.save_asset(a, expected)
        })?;
        tracing::info!(%asset_id, %product_id, "asset registered");
        Ok(asset)
    }

    pub fn asset(&self, asset_id: AssetId) -> ServiceResult<Asset> {
        self.store
            .asset(asset_id)?
            .ok_or_else(|| DomainError::not_found("asset", asset_id).into())
    }

    /// Move an asset in or out of circulation (maintenance, retirement, loss).
    #[tracing::instrument(skip(self, note))]
    pub fn change_asset_status(
        &self,
        asset_id: AssetId,
        status: AssetStatus,
        note: Option<String>,
    ) -> ServiceResult<Asset> {
        let mut asset = self.asset(asset_id)?;
        let cmd = AssetCommand::ChangeAssetStatus(ChangeAssetStatus {
            asset_id,
            status,
            note,
            occurred_at: self.now(),
        });
        self.commit(ASSET_AGGREGATE, &mut asset, &cmd, |a, expected| {
            self.store.save_asset(a, expected)
        })?;
        tracing::info!(%asset_id, status = status.as_str(), "asset status changed");
        Ok(asset)
    }

    /// Record a photo URL handed back by the upload service.
    pub fn attach_asset_photo(&self, asset_id: AssetId, url: &str) -> ServiceResult<Asset> {
        let mut asset = self.asset(asset_id)?;
        let cmd = AssetCommand::AttachPhoto(AttachPhoto {
            asset_id,
            url: url.to_string(),
            occurred_at: self.now(),
        });
        self.commit(ASSET_AGGREGATE, &mut asset, &cmd, |a, expected| {
            self.store.save_asset(a, expected)
        })?;
        Ok(asset)
    }
}
