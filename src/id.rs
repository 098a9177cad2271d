use std::fmt;

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StoreError;

/// Identifier of a stored product.
///
/// Most products carry a store-generated ObjectId, but some records were
/// inserted with a hand-written string `_id`. Both forms are kept distinct so
/// that a lookup can match either one.
///
/// A canonical id keeps the text it was parsed from: hex is case-insensitive
/// for the ObjectId, but a legacy string `_id` must match that text exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductId {
    Canonical { oid: ObjectId, raw: String },
    Legacy(String),
}

impl ProductId {
    /// Classifies a path parameter. Any 24-character hex string is treated as
    /// canonical; everything else is a legacy identifier.
    pub fn parse(raw: &str) -> Self {
        match ObjectId::parse_str(raw) {
            Ok(oid) => ProductId::Canonical {
                oid,
                raw: raw.to_string(),
            },
            Err(_) => ProductId::Legacy(raw.to_string()),
        }
    }

    pub fn canonical(oid: ObjectId) -> Self {
        ProductId::Canonical {
            oid,
            raw: oid.to_hex(),
        }
    }

    /// Filter matching this identifier in the store.
    ///
    /// A canonical id also matches a legacy record whose string `_id` is
    /// exactly the requested text.
    pub fn lookup_filter(&self) -> Document {
        match self {
            ProductId::Canonical { oid, raw } => doc! {
                "$or": [ { "_id": *oid }, { "_id": raw.as_str() } ]
            },
            ProductId::Legacy(raw) => doc! { "_id": raw.as_str() },
        }
    }

    /// Whether a stored id is reached by a lookup with `self`.
    pub fn matches(&self, stored: &ProductId) -> bool {
        match (self, stored) {
            (ProductId::Canonical { oid: wanted, .. }, ProductId::Canonical { oid: have, .. }) => {
                wanted == have
            }
            (ProductId::Canonical { raw, .. }, ProductId::Legacy(have)) => raw == have,
            (ProductId::Legacy(wanted), ProductId::Legacy(have)) => wanted == have,
            (ProductId::Legacy(_), ProductId::Canonical { .. }) => false,
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            ProductId::Canonical { oid, .. } => Bson::ObjectId(*oid),
            ProductId::Legacy(raw) => Bson::String(raw.clone()),
        }
    }
}

impl TryFrom<Bson> for ProductId {
    type Error = StoreError;

    fn try_from(value: Bson) -> Result<Self, Self::Error> {
        match value {
            Bson::ObjectId(oid) => Ok(ProductId::canonical(oid)),
            Bson::String(raw) => Ok(ProductId::Legacy(raw)),
            other => Err(StoreError::UnexpectedId(format!("{:?}", other))),
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductId::Canonical { oid, .. } => write!(f, "{}", oid.to_hex()),
            ProductId::Legacy(raw) => f.write_str(raw),
        }
    }
}

// Rendered as plain text for API clients. Store filters never go through
// serde; they are built from `to_bson` and `lookup_filter`.
impl Serialize for ProductId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Bson::deserialize(deserializer)?;
        ProductId::try_from(raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "65a1f0c2b4d3e2f1a0b9c8d7";

    #[test]
    fn hex_strings_parse_as_canonical() {
        let id = ProductId::parse(HEX);
        assert_eq!(id, ProductId::canonical(ObjectId::parse_str(HEX).unwrap()));
        assert_eq!(id.to_string(), HEX);
    }

    #[test]
    fn other_strings_parse_as_legacy() {
        assert_eq!(ProductId::parse("shoe-42"), ProductId::Legacy("shoe-42".into()));
        // 23 hex characters is not an ObjectId.
        assert_eq!(
            ProductId::parse(&HEX[1..]),
            ProductId::Legacy(HEX[1..].to_string())
        );
    }

    #[test]
    fn canonical_lookup_matches_both_forms() {
        let id = ProductId::parse(HEX);
        let oid = ObjectId::parse_str(HEX).unwrap();
        assert_eq!(
            id.lookup_filter(),
            doc! { "$or": [ { "_id": oid }, { "_id": HEX } ] }
        );
        assert!(id.matches(&ProductId::canonical(oid)));
        assert!(id.matches(&ProductId::Legacy(HEX.to_string())));
    }

    #[test]
    fn uppercase_hex_matches_the_exact_legacy_text() {
        let upper = HEX.to_uppercase();
        let id = ProductId::parse(&upper);
        let oid = ObjectId::parse_str(HEX).unwrap();

        assert_eq!(
            id.lookup_filter(),
            doc! { "$or": [ { "_id": oid }, { "_id": upper.as_str() } ] }
        );
        assert!(id.matches(&ProductId::Legacy(upper.clone())));
        assert!(!id.matches(&ProductId::Legacy(HEX.to_string())));
        assert!(id.matches(&ProductId::canonical(oid)));
        assert_eq!(id.to_string(), HEX);
    }

    #[test]
    fn legacy_lookup_matches_only_the_string_form() {
        let id = ProductId::parse("shoe-42");
        assert_eq!(id.lookup_filter(), doc! { "_id": "shoe-42" });
        assert!(id.matches(&ProductId::Legacy("shoe-42".into())));
        assert!(!id.matches(&ProductId::Legacy("shoe-43".into())));
    }

    #[test]
    fn only_object_ids_and_strings_are_accepted_from_the_store() {
        assert!(ProductId::try_from(Bson::Int32(7)).is_err());
        assert_eq!(
            ProductId::try_from(Bson::String("manual".into())).unwrap(),
            ProductId::Legacy("manual".into())
        );
    }
}
