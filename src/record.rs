//! Records produced and consumed by the harvest pipeline

use url::Url;

/// Header row shared by the final mapping and every checkpoint
pub const MAPPING_HEADER: [&str; 2] = ["SKU ID", "SKU Group"];

/// A single SKU ID to SKU group pairing
///
/// The same SKU ID may appear under several groups; identity is the pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SkuRecord {
    pub sku_id: String,
    pub sku_group: String,
}

impl SkuRecord {
    pub fn new(sku_id: impl Into<String>, sku_group: impl Into<String>) -> Self {
        Self {
            sku_id: sku_id.into(),
            sku_group: sku_group.into(),
        }
    }
}

/// A SKU group page discovered on the landing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTarget {
    /// Trimmed anchor text of the group link
    pub group_name: String,

    /// Absolute URL of the group page
    pub group_url: Url,
}

impl GroupTarget {
    pub fn new(group_name: impl Into<String>, group_url: Url) -> Self {
        Self {
            group_name: group_name.into(),
            group_url,
        }
    }
}
