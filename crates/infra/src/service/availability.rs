use serde_json::Value as JsonValue;

use wardrobe_catalog::{Asset, BlockedPeriod};
use wardrobe_core::{AssetId, BlockedPeriodId, DateRange, DomainError, ProductId, UserId};
use wardrobe_events::{EventBus, EventEnvelope};
use wardrobe_rentals::{BlockedInterval, Rental, available_count, blocked_intervals};

use super::Marketplace;
use crate::error::ServiceResult;
use crate::store::Store;

impl<S, B> Marketplace<S, B>
where
    S: Store,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Free units of a product for `[start, end]` (`YYYY-MM-DD`, inclusive).
    ///
    /// Dates are validated before the store is touched.
    #[tracing::instrument(skip(self))]
    pub fn available_count(&self, product_id: ProductId, start: &str, end: &str) -> ServiceResult<u32> {
        let range = DateRange::parse(start, end)?;
        self.count_free(product_id, &range)
    }

    pub(crate) fn count_free(&self, product_id: ProductId, range: &DateRange) -> ServiceResult<u32> {
        let assets = self.store.assets_of_product(product_id)?;
        if !assets.iter().any(Asset::is_available) {
            return Ok(0);
        }
        let rentals = self.rentals_on(&assets)?;
        Ok(available_count(&assets, &rentals, range))
    }

    pub(crate) fn rentals_on(&self, assets: &[Asset]) -> ServiceResult<Vec<Rental>> {
        let ids: Vec<AssetId> = assets.iter().map(Asset::id_typed).collect();
        Ok(self.store.rentals_for_assets(&ids)?)
    }

    /// What is blocked on a product's calendar and why: blocking rentals on
    /// any of its assets plus manual holds, ordered by start date.
    pub fn blocked_intervals(
        &self,
        product_id: ProductId,
        start: &str,
        end: &str,
    ) -> ServiceResult<Vec<BlockedInterval>> {
        let range = DateRange::parse(start, end)?;
        let assets = self.store.assets_of_product(product_id)?;
        let rentals = self.rentals_on(&assets)?;
        let periods = self.store.blocked_periods(product_id)?;
        Ok(blocked_intervals(&rentals, &periods, &range))
    }

    /// True if a manual hold overlaps the range.
    pub fn is_product_blocked(&self, product_id: ProductId, start: &str, end: &str) -> ServiceResult<bool> {
        let range = DateRange::parse(start, end)?;
        Ok(self
            .store
            .blocked_periods(product_id)?
            .iter()
            .any(|p| p.blocks(&range)))
    }

    #[tracing::instrument(skip(self, reason))]
    pub fn add_blocked_period(
        &self,
        product_id: ProductId,
        start: &str,
        end: &str,
        reason: &str,
        created_by: UserId,
    ) -> ServiceResult<BlockedPeriod> {
        let range = DateRange::parse(start, end)?;
        self.product(product_id)?;

        let period = BlockedPeriod::new(product_id, range, reason, created_by, self.now())?;
        self.store.insert_blocked_period(period.clone())?;
        tracing::info!(%product_id, blocked_period_id = %period.id, %range, "product blocked");
        Ok(period)
    }

    pub fn remove_blocked_period(&self, blocked_period_id: BlockedPeriodId) -> ServiceResult<BlockedPeriod> {
        let removed = self
            .store
            .remove_blocked_period(blocked_period_id)?
            .ok_or_else(|| DomainError::not_found("blocked period", blocked_period_id))?;
        tracing::info!(product_id = %removed.product_id, %blocked_period_id, "product hold lifted");
        Ok(removed)
    }
}
