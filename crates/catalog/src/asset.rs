use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wardrobe_core::{Aggregate, AggregateRoot, AssetId, DomainError, ProductId};
use wardrobe_events::Event;

/// Physical condition of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionGrade {
    A,
    B,
    C,
}

/// Asset lifecycle status.
///
/// Only `Available` assets take part in availability; the others are excluded
/// regardless of dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Available,
    Rented,
    Maintenance,
    Inactive,
    Lost,
}

impl AssetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetStatus::Available => "available",
            AssetStatus::Rented => "rented",
            AssetStatus::Maintenance => "maintenance",
            AssetStatus::Inactive => "inactive",
            AssetStatus::Lost => "lost",
        }
    }

    /// Transition table for inspection/maintenance workflows.
    pub fn can_become(self, next: AssetStatus) -> bool {
        use AssetStatus::*;
        match (self, next) {
            (Lost, _) => false,
            (_, Lost) => true,
            (Available, Maintenance | Rented | Inactive) => true,
            (Maintenance, Available | Inactive) => true,
            (Rented, Available | Maintenance | Inactive) => true,
            (Inactive, Available) => true,
            (Available, Available)
            | (Maintenance, Maintenance | Rented)
            | (Rented, Rented)
            | (Inactive, Inactive | Rented | Maintenance) => false,
        }
    }
}

impl core::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Asset (one physical, individually trackable copy of a product).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    id: AssetId,
    product_id: Option<ProductId>,
    asset_code: String,
    condition_grade: ConditionGrade,
    status: AssetStatus,
    photo_urls: Vec<String>,
    version: u64,
    created: bool,
}

impl Asset {
    /// Create an empty, not-yet-registered aggregate instance.
    pub fn empty(id: AssetId) -> Self {
        Self {
            id,
            product_id: None,
            asset_code: String::new(),
            condition_grade: ConditionGrade::A,
            status: AssetStatus::Inactive,
            photo_urls: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AssetId {
        self.id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn asset_code(&self) -> &str {
        &self.asset_code
    }

    pub fn condition_grade(&self) -> ConditionGrade {
        self.condition_grade
    }

    pub fn status(&self) -> AssetStatus {
        self.status
    }

    pub fn photo_urls(&self) -> &[String] {
        &self.photo_urls
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_available(&self) -> bool {
        self.created && self.status == AssetStatus::Available
    }
}

impl AggregateRoot for Asset {
    type Id = AssetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterAsset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAsset {
    pub asset_id: AssetId,
    pub product_id: ProductId,
    pub asset_code: String,
    pub condition_grade: ConditionGrade,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeAssetStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAssetStatus {
    pub asset_id: AssetId,
    pub status: AssetStatus,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegradeAsset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegradeAsset {
    pub asset_id: AssetId,
    pub condition_grade: ConditionGrade,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachPhoto (URL issued by the upload service, stored opaquely).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachPhoto {
    pub asset_id: AssetId,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetCommand {
    RegisterAsset(RegisterAsset),
    ChangeAssetStatus(ChangeAssetStatus),
    RegradeAsset(RegradeAsset),
    AttachPhoto(AttachPhoto),
}

/// Event: AssetRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRegistered {
    pub asset_id: AssetId,
    pub product_id: ProductId,
    pub asset_code: String,
    pub condition_grade: ConditionGrade,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssetStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStatusChanged {
    pub asset_id: AssetId,
    pub from: AssetStatus,
    pub to: AssetStatus,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssetRegraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRegraded {
    pub asset_id: AssetId,
    pub condition_grade: ConditionGrade,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PhotoAttached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAttached {
    pub asset_id: AssetId,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetEvent {
    AssetRegistered(AssetRegistered),
    AssetStatusChanged(AssetStatusChanged),
    AssetRegraded(AssetRegraded),
    PhotoAttached(PhotoAttached),
}

impl Event for AssetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AssetEvent::AssetRegistered(_) => "catalog.asset.registered",
            AssetEvent::AssetStatusChanged(_) => "catalog.asset.status_changed",
            AssetEvent::AssetRegraded(_) => "catalog.asset.regraded",
            AssetEvent::PhotoAttached(_) => "catalog.asset.photo_attached",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AssetEvent::AssetRegistered(e) => e.occurred_at,
            AssetEvent::AssetStatusChanged(e) => e.occurred_at,
            AssetEvent::AssetRegraded(e) => e.occurred_at,
            AssetEvent::PhotoAttached(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Asset {
    type Command = AssetCommand;
    type Event = AssetEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AssetEvent::AssetRegistered(e) => {
                self.id = e.asset_id;
                self.product_id = Some(e.product_id);
                self.asset_code = e.asset_code.clone();
                self.condition_grade = e.condition_grade;
                self.status = AssetStatus::Available;
                self.created = true;
            }
            AssetEvent::AssetStatusChanged(e) => {
                self.status = e.to;
            }
            AssetEvent::AssetRegraded(e) => {
                self.condition_grade = e.condition_grade;
            }
            AssetEvent::PhotoAttached(e) => {
                self.photo_urls.push(e.url.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AssetCommand::RegisterAsset(cmd) => self.handle_register(cmd),
            AssetCommand::ChangeAssetStatus(cmd) => self.handle_change_status(cmd),
            AssetCommand::RegradeAsset(cmd) => self.handle_regrade(cmd),
            AssetCommand::AttachPhoto(cmd) => self.handle_attach_photo(cmd),
        }
    }
}

impl Asset {
    fn ensure_exists(&self, asset_id: AssetId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("asset", asset_id));
        }
        if self.id != asset_id {
            return Err(DomainError::invariant("asset_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterAsset) -> Result<Vec<AssetEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("asset already registered"));
        }
        let code = cmd.asset_code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("asset code cannot be empty"));
        }
        // Uniqueness of the code across assets is checked by the repository.

        Ok(vec![AssetEvent::AssetRegistered(AssetRegistered {
            asset_id: cmd.asset_id,
            product_id: cmd.product_id,
            asset_code: code.to_string(),
            condition_grade: cmd.condition_grade,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeAssetStatus) -> Result<Vec<AssetEvent>, DomainError> {
        self.ensure_exists(cmd.asset_id)?;
        if !self.status.can_become(cmd.status) {
            return Err(DomainError::transition(
                "asset",
                self.status,
                match cmd.status {
                    AssetStatus::Available => "release",
                    AssetStatus::Rented => "rent out",
                    AssetStatus::Maintenance => "send to maintenance",
                    AssetStatus::Inactive => "retire",
                    AssetStatus::Lost => "mark lost",
                },
            ));
        }

        Ok(vec![AssetEvent::AssetStatusChanged(AssetStatusChanged {
            asset_id: cmd.asset_id,
            from: self.status,
            to: cmd.status,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_regrade(&self, cmd: &RegradeAsset) -> Result<Vec<AssetEvent>, DomainError> {
        self.ensure_exists(cmd.asset_id)?;
        if self.condition_grade == cmd.condition_grade {
            return Ok(vec![]);
        }
        Ok(vec![AssetEvent::AssetRegraded(AssetRegraded {
            asset_id: cmd.asset_id,
            condition_grade: cmd.condition_grade,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach_photo(&self, cmd: &AttachPhoto) -> Result<Vec<AssetEvent>, DomainError> {
        self.ensure_exists(cmd.asset_id)?;
        if cmd.url.trim().is_empty() {
            return Err(DomainError::validation("photo url cannot be empty"));
        }
        Ok(vec![AssetEvent::PhotoAttached(PhotoAttached {
            asset_id: cmd.asset_id,
            url: cmd.url.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
