//! Availability over physical assets.
//!
//! Pure functions over rows the caller fetched: the store-backed service in
//! `wardrobe-infra` loads assets, rentals and blocked periods, then asks here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use wardrobe_catalog::{Asset, BlockedPeriod};
use wardrobe_core::{AssetId, BlockedPeriodId, DateRange, OrderId, RentalId, UserId};

use crate::rental::Rental;
use crate::status::RentalStatus;

/// Assets held by a blocking rental anywhere in `range`.
pub fn blocked_asset_ids<'a>(
    rentals: impl IntoIterator<Item = &'a Rental>,
    range: &DateRange,
) -> HashSet<AssetId> {
    rentals
        .into_iter()
        .filter(|r| r.blocks(range))
        .map(Rental::asset_id)
        .collect()
}

/// Number of rentable assets with no blocking rental overlapping `range`.
///
/// Only assets in status `available` count; the rest are out of circulation
/// whatever the dates.
pub fn available_count(assets: &[Asset], rentals: &[Rental], range: &DateRange) -> u32 {
    let candidates: Vec<AssetId> = assets
        .iter()
        .filter(|a| a.is_available())
        .map(Asset::id_typed)
        .collect();
    if candidates.is_empty() {
        return 0;
    }

    let blocked = blocked_asset_ids(rentals, range);
    let free = candidates.iter().filter(|id| !blocked.contains(id)).count();
    u32::try_from(free).unwrap_or(u32::MAX)
}

/// First-fit asset assignment across the lines of one booking.
///
/// Remembers what it handed out so a later line for the same product cannot be
/// given an asset an earlier line already took for overlapping dates.
#[derive(Debug, Default, Clone)]
pub struct AssetPlanner {
    taken: Vec<(AssetId, DateRange)>,
}

impl AssetPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Up to `wanted` free assets for the blocked interval `blocked`, in the
    /// order `assets` lists them. Fewer than `wanted` means a shortage.
    pub fn pick(
        &mut self,
        assets: &[Asset],
        committed: &[Rental],
        blocked: &DateRange,
        wanted: u32,
    ) -> Vec<AssetId> {
        let busy = blocked_asset_ids(committed, blocked);
        let mut picked = Vec::new();

        for asset in assets.iter().filter(|a| a.is_available()) {
            if picked.len() as u64 >= u64::from(wanted) {
                break;
            }
            let id = asset.id_typed();
            let pending_clash = self
                .taken
                .iter()
                .any(|(taken, range)| *taken == id && range.overlaps(blocked));
            if busy.contains(&id) || pending_clash {
                continue;
            }
            self.taken.push((id, *blocked));
            picked.push(id);
        }

        picked
    }

    pub fn taken(&self) -> &[(AssetId, DateRange)] {
        &self.taken
    }
}

/// Why an interval is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BlockSource {
    Rental {
        rental_id: RentalId,
        order_id: OrderId,
        asset_id: AssetId,
        status: RentalStatus,
    },
    Manual {
        blocked_period_id: BlockedPeriodId,
        reason: String,
        created_by: UserId,
    },
}

/// One entry of a product's blocking calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedInterval {
    pub interval: DateRange,
    pub source: BlockSource,
}

/// Every blocking rental interval and manual hold overlapping `range`, ordered
/// by start date.
pub fn blocked_intervals(
    rentals: &[Rental],
    periods: &[BlockedPeriod],
    range: &DateRange,
) -> Vec<BlockedInterval> {
    let mut out: Vec<BlockedInterval> = rentals
        .iter()
        .filter(|r| r.blocks(range))
        .map(|r| BlockedInterval {
            interval: r.blocked(),
            source: BlockSource::Rental {
                rental_id: r.id_typed(),
                order_id: r.order_id(),
                asset_id: r.asset_id(),
                status: r.status(),
            },
        })
        .chain(periods.iter().filter(|p| p.blocks(range)).map(|p| BlockedInterval {
            interval: p.period,
            source: BlockSource::Manual {
                blocked_period_id: p.id,
                reason: p.reason.clone(),
                created_by: p.created_by,
            },
        }))
        .collect();

    out.sort_by_key(|b| (b.interval.start(), b.interval.end()));
    out
}
