use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};
use strum_macros::EnumString;

use crate::{impl_add_sum_primitive, impl_display_primitive, impl_from_primitive};

// ================================================================================================
// Domain Strong Types (NewTypes)
// ================================================================================================

/// Identifies an asset (security id) whose bars live in the store.
///
/// Asset metadata (symbol, exchange, listing dates) is owned by an external asset finder;
/// the store only needs a stable, ordered key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct AssetId(pub u64);
impl_from_primitive!(AssetId, u64);
impl_display_primitive!(AssetId, "sid");

/// Represents a traded price level in the quote currency.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Price(pub f64);
impl_from_primitive!(Price, f64);

impl Price {
    /// Returns `true` if the price is a real, finite quote.
    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

/// Represents traded volume (shares / contracts) within a bar.
///
/// A volume of zero means no trade occurred. Traded bars always carry a positive volume.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Volume(pub u64);
impl_from_primitive!(Volume, u64);
impl_add_sum_primitive!(Volume, u64);

// ================================================================================================
// Query Vocabulary
// ================================================================================================

/// Resolution at which a last-traded search or spot lookup is performed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Step backward one calendar minute at a time.
    #[default]
    Minute,
    /// Step backward one session at a time over session aggregate bars.
    Day,
}

/// A field of a bar that can be read as a spot value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BarField {
    Open,
    High,
    Low,
    Close,
    Volume,
    /// The close of the last traded bar at or before the query (forward-filled).
    Price,
}
