//! Catalog interaction types.
//!
//! These types mirror the JSON returned by the list, detail and species
//! endpoints. Nested API shapes (`{"type": {"name", "url"}}` and friends) are
//! flattened into domain types on decode.

use std::hash::{Hash, Hasher};
use std::num::NonZeroU32;

use derive_more::{Display, From, FromStr};
use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Positive integer identifying one catalog entity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    From,
    FromStr,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(NonZeroU32);

impl EntityId {
    /// Returns [None] for `0`.
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(EntityId)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

// ---------------------------------------------------------------------------
// List endpoint
// ---------------------------------------------------------------------------

/// Body of `GET {base}/pokemon/?limit=..&offset=..`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageResponse {
    pub results: Vec<ListEntry>,
}

/// One row of the paged list.
///
/// Identity is the `name`; the list is not deduplicated, so malformed input
/// may contain equal entries.
#[derive(Debug, Clone, Eq, Deserialize, Serialize)]
pub struct ListEntry {
    pub name: String,
    /// URL of the entity's detail resource, e.g. `.../pokemon/25/`.
    #[serde(rename = "url")]
    pub reference: String,
}

impl ListEntry {
    pub fn new(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
        }
    }

    /// Extracts the entity id from [Self::reference].
    ///
    /// The reference is split on `/` and the last segment that parses as a
    /// positive integer wins. Returns [None] if no segment does.
    pub fn id(&self) -> Option<EntityId> {
        self.reference
            .split('/')
            .filter(|segment| !segment.is_empty())
            .filter_map(|segment| segment.parse::<NonZeroU32>().ok())
            .last()
            .map(EntityId)
    }
}

impl PartialEq for ListEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Hash for ListEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

// ---------------------------------------------------------------------------
// Detail endpoint
// ---------------------------------------------------------------------------

/// `{name, url}` pair the API uses for every linked resource.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
struct NamedResource {
    name: String,
    #[serde(default)]
    url: String,
}

impl NamedResource {
    fn named(name: String) -> Self {
        Self {
            name,
            url: String::new(),
        }
    }
}

/// Body of `GET {base}/pokemon/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EntityDetail {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub sprites: Sprites,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
    #[serde(default)]
    pub stats: Vec<Stat>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Sprites {
    /// Image URL as sent by the API; `null` for entities without artwork.
    #[serde(default)]
    pub front_default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "ApiTypeSlot", into = "ApiTypeSlot")]
pub struct TypeSlot {
    pub slot: u8,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ApiTypeSlot {
    slot: u8,
    #[serde(rename = "type")]
    kind: NamedResource,
}

impl From<ApiTypeSlot> for TypeSlot {
    fn from(value: ApiTypeSlot) -> Self {
        Self {
            slot: value.slot,
            name: value.kind.name,
        }
    }
}

impl From<TypeSlot> for ApiTypeSlot {
    fn from(value: TypeSlot) -> Self {
        Self {
            slot: value.slot,
            kind: NamedResource::named(value.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "ApiStat", into = "ApiStat")]
pub struct Stat {
    pub base_value: u32,
    pub effort: u32,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ApiStat {
    base_stat: u32,
    effort: u32,
    stat: NamedResource,
}

impl From<ApiStat> for Stat {
    fn from(value: ApiStat) -> Self {
        Self {
            base_value: value.base_stat,
            effort: value.effort,
            name: value.stat.name,
        }
    }
}

impl From<Stat> for ApiStat {
    fn from(value: Stat) -> Self {
        Self {
            base_stat: value.base_value,
            effort: value.effort,
            stat: NamedResource::named(value.name),
        }
    }
}

impl EntityDetail {
    /// The sprite URL, if the API sent one that parses.
    pub fn image_ref(&self) -> Option<Url> {
        self.sprites
            .front_default
            .as_deref()
            .and_then(|raw| Url::parse(raw).ok())
    }

    /// Type labels ordered by their slot.
    pub fn type_names(&self) -> Vec<String> {
        let mut types = self.types.iter().collect::<Vec<_>>();
        types.sort_by_key(|type_slot| type_slot.slot);
        types
            .into_iter()
            .map(|type_slot| type_slot.name.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Species endpoint
// ---------------------------------------------------------------------------

/// Body of `GET {base}/pokemon-species/{id}`, reduced to the description
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SpeciesInfo {
    #[serde(rename = "flavor_text_entries", default)]
    pub description_entries: Vec<DescriptionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "ApiFlavorText", into = "ApiFlavorText")]
pub struct DescriptionEntry {
    pub text: String,
    pub language_code: String,
}

impl DescriptionEntry {
    pub fn new(text: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language_code: language_code.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ApiFlavorText {
    flavor_text: String,
    language: NamedResource,
}

impl From<ApiFlavorText> for DescriptionEntry {
    fn from(value: ApiFlavorText) -> Self {
        Self {
            text: value.flavor_text,
            language_code: value.language.name,
        }
    }
}

impl From<DescriptionEntry> for ApiFlavorText {
    fn from(value: DescriptionEntry) -> Self {
        Self {
            flavor_text: value.text,
            language: NamedResource::named(value.language_code),
        }
    }
}
