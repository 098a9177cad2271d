use chrono::{DateTime, TimeZone, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, StoreResult};
use crate::id::ProductId;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
pub struct Rating {
    #[serde(default)]
    #[validate(range(min = 0.0, message = "rating average must not be negative"))]
    pub average: f64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeStock {
    #[serde(default)]
    pub size: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub sizes: Vec<SizeStock>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_material: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_care: Option<String>,
}

/// A catalog product as stored in the `products` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ProductId>,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub discount_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<Specifications>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Converts an amount to a whole count. Fractions are truncated, negative and
/// NaN values become 0, and values above `u32::MAX` saturate.
fn to_count(amount: f64) -> u32 {
    amount as u32
}

// Stored documents were written by several tools over time: counts show up as
// doubles or strings and timestamps as BSON dates or free text. None of that
// may fail a read of the whole listing.

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Bson::deserialize(deserializer)? {
        Bson::Int32(n) => to_count(n as f64),
        Bson::Int64(n) => to_count(n as f64),
        Bson::Double(n) => to_count(n),
        Bson::String(s) => s.trim().parse::<f64>().map(to_count).unwrap_or(0),
        _ => 0,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Bson::deserialize(deserializer)? {
        Bson::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Bson::DateTime(t) => Utc.timestamp_millis_opt(t.timestamp_millis()).single(),
        _ => None,
    })
}

/// Reads a loosely typed numeric form field. Numbers and numeric strings are
/// accepted; anything else reads as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
    .filter(|n| n.is_finite()))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RatingInput {
    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0))]
    pub average: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0))]
    pub count: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SizeInput {
    #[serde(default)]
    pub size: String,
    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0, message = "stock must not be negative"))]
    pub stock: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VariantInput {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    #[validate]
    pub sizes: Vec<SizeInput>,
}

/// Body of `POST /products`, as submitted by the seller form.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(
        required(message = "Missing title or price"),
        length(min = 1, message = "Missing title or price")
    )]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(
        required(message = "Missing title or price"),
        range(min = 0.0, message = "price must not be negative")
    )]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0, message = "discountPrice must not be negative"))]
    pub discount_price: Option<f64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub gender: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    #[validate]
    pub rating: RatingInput,
    #[serde(default)]
    #[validate]
    pub variants: Vec<VariantInput>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    pub specifications: Option<Specifications>,
}

impl CreateProductRequest {
    /// Validates the request and builds the product to insert, stamped with `now`.
    pub fn into_product(self, now: DateTime<Utc>) -> Result<Product, AppError> {
        self.validate()
            .map_err(|errors| AppError::Validation(validation_message(&errors)))?;

        let CreateProductRequest {
            title,
            price,
            discount_price,
            category,
            brand,
            gender,
            description,
            thumbnail,
            rating,
            variants,
            images,
            sizes,
            specifications,
        } = self;

        let (Some(title), Some(price)) = (title, price) else {
            return Err(AppError::Validation("Missing title or price".to_string()));
        };

        let variants = variants
            .into_iter()
            .map(|v| Variant {
                color: v.color,
                image: v.image,
                sizes: v
                    .sizes
                    .into_iter()
                    .map(|s| SizeStock {
                        size: s.size,
                        stock: to_count(s.stock.unwrap_or(0.0)),
                    })
                    .collect(),
            })
            .collect();

        Ok(Product {
            id: None,
            title,
            price,
            discount_price: discount_price.unwrap_or(0.0),
            category,
            brand,
            gender,
            description,
            thumbnail,
            rating: Rating {
                average: rating.average.unwrap_or(0.0),
                count: to_count(rating.count.unwrap_or(0.0)),
            },
            variants,
            images,
            sizes,
            specifications,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }
}

/// Body of `PUT /products/{id}`. Only the supplied fields are merged into the
/// stored document; timestamps are managed by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, message = "discountPrice must not be negative"))]
    pub discount_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate]
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<Variant>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifications: Option<Specifications>,
}

impl UpdateProductRequest {
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()
            .map_err(|errors| AppError::Validation(validation_message(&errors)))
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    pub fn field_count(&self) -> usize {
        [
            self.title.is_some(),
            self.price.is_some(),
            self.discount_price.is_some(),
            self.category.is_some(),
            self.brand.is_some(),
            self.gender.is_some(),
            self.description.is_some(),
            self.thumbnail.is_some(),
            self.rating.is_some(),
            self.variants.is_some(),
            self.images.is_some(),
            self.sizes.is_some(),
            self.specifications.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    /// `$set` body for the store: the supplied fields plus a fresh `updatedAt`.
    pub fn to_set_document(&self, now: DateTime<Utc>) -> StoreResult<Document> {
        let mut fields = bson::to_document(self)?;
        fields.insert("updatedAt", bson::to_bson(&now)?);
        Ok(fields)
    }

    /// Matches documents where at least one supplied field differs from the
    /// patch. Documents that already hold every value are left alone, so
    /// their `updatedAt` does not move.
    pub fn to_changed_filter(&self) -> StoreResult<Document> {
        let differs: Vec<Bson> = bson::to_document(self)?
            .into_iter()
            .map(|(field, value)| {
                let mut clause = Document::new();
                clause.insert(field, doc! { "$ne": value });
                Bson::Document(clause)
            })
            .collect();
        Ok(doc! { "$or": differs })
    }

    /// Merges the supplied fields into `product`. `updatedAt` is refreshed
    /// only when a value actually changed; returns whether one did.
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) -> bool {
        let patch = self.clone();
        let mut merged = product.clone();
        if let Some(title) = patch.title {
            merged.title = title;
        }
        if let Some(price) = patch.price {
            merged.price = price;
        }
        if let Some(discount_price) = patch.discount_price {
            merged.discount_price = discount_price;
        }
        if patch.category.is_some() {
            merged.category = patch.category;
        }
        if patch.brand.is_some() {
            merged.brand = patch.brand;
        }
        if patch.gender.is_some() {
            merged.gender = patch.gender;
        }
        if patch.description.is_some() {
            merged.description = patch.description;
        }
        if patch.thumbnail.is_some() {
            merged.thumbnail = patch.thumbnail;
        }
        if let Some(rating) = patch.rating {
            merged.rating = rating;
        }
        if let Some(variants) = patch.variants {
            merged.variants = variants;
        }
        if let Some(images) = patch.images {
            merged.images = images;
        }
        if let Some(sizes) = patch.sizes {
            merged.sizes = sizes;
        }
        if patch.specifications.is_some() {
            merged.specifications = patch.specifications;
        }

        if merged == *product {
            return false;
        }
        merged.updated_at = Some(now);
        *product = merged;
        true
    }
}

fn validation_message(errors: &ValidationErrors) -> String {
    let fields = errors.field_errors();
    let missing_required = ["title", "price"].iter().any(|name| {
        fields
            .get(name)
            .is_some_and(|errs| errs.iter().any(|e| e.code == "required" || e.code == "length"))
    });
    if missing_required {
        return "Missing title or price".to_string();
    }
    errors.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn create(body: serde_json::Value) -> Result<Product, AppError> {
        serde_json::from_value::<CreateProductRequest>(body)
            .unwrap()
            .into_product(now())
    }

    #[test]
    fn minimal_product_gets_defaults() {
        let product = create(json!({ "title": "Shoe A", "price": 50 })).unwrap();

        assert_eq!(product.title, "Shoe A");
        assert_eq!(product.price, 50.0);
        assert_eq!(product.discount_price, 0.0);
        assert_eq!(product.rating, Rating { average: 0.0, count: 0 });
        assert!(product.variants.is_empty());
        assert_eq!(product.created_at, Some(now()));
        assert_eq!(product.updated_at, Some(now()));
        assert!(product.id.is_none());
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let product = create(json!({
            "title": "Runner",
            "price": "79.5",
            "discountPrice": "not a number",
            "rating": { "average": "4.5", "count": "12" },
            "variants": [
                { "color": "red", "image": "red.png",
                  "sizes": [ { "size": "42", "stock": "3" }, { "size": "43", "stock": "" } ] }
            ]
        }))
        .unwrap();

        assert_eq!(product.price, 79.5);
        assert_eq!(product.discount_price, 0.0);
        assert_eq!(product.rating, Rating { average: 4.5, count: 12 });
        assert_eq!(
            product.variants[0].sizes,
            vec![
                SizeStock { size: "42".into(), stock: 3 },
                SizeStock { size: "43".into(), stock: 0 },
            ]
        );
    }

    #[test]
    fn title_and_price_are_required() {
        for body in [
            json!({ "price": 10 }),
            json!({ "title": "", "price": 10 }),
            json!({ "title": "Boot" }),
            json!({ "title": "Boot", "price": "free" }),
        ] {
            match create(body.clone()) {
                Err(AppError::Validation(msg)) => assert_eq!(msg, "Missing title or price", "{body}"),
                other => panic!("expected validation error for {body}, got {other:?}"),
            }
        }
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(matches!(
            create(json!({ "title": "Boot", "price": -1 })),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            create(json!({
                "title": "Boot", "price": 5,
                "variants": [ { "sizes": [ { "size": "40", "stock": -2 } ] } ]
            })),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn set_document_contains_only_supplied_fields() {
        let patch = UpdateProductRequest {
            price: Some(65.0),
            ..Default::default()
        };
        let set = patch.to_set_document(now()).unwrap();

        assert_eq!(
            set,
            doc! { "price": 65.0, "updatedAt": bson::to_bson(&now()).unwrap() }
        );
        assert_eq!(patch.field_count(), 1);
        assert!(UpdateProductRequest::default().is_empty());
    }

    #[test]
    fn apply_merges_without_touching_other_fields() {
        let mut product = create(json!({ "title": "Shoe A", "price": 50, "brand": "Acme" })).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();

        let changed = UpdateProductRequest {
            price: Some(45.0),
            ..Default::default()
        }
        .apply_to(&mut product, later);

        assert!(changed);
        assert_eq!(product.price, 45.0);
        assert_eq!(product.title, "Shoe A");
        assert_eq!(product.brand.as_deref(), Some("Acme"));
        assert_eq!(product.created_at, Some(now()));
        assert_eq!(product.updated_at, Some(later));
    }

    #[test]
    fn unchanged_values_keep_updated_at() {
        let mut product = create(json!({ "title": "Shoe A", "price": 50, "brand": "Acme" })).unwrap();
        let before = product.clone();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();

        let changed = UpdateProductRequest {
            price: Some(50.0),
            brand: Some("Acme".into()),
            ..Default::default()
        }
        .apply_to(&mut product, later);

        assert!(!changed);
        assert_eq!(product, before);
    }

    #[test]
    fn changed_filter_requires_a_differing_field() {
        let patch = UpdateProductRequest {
            price: Some(65.0),
            brand: Some("Acme".into()),
            ..Default::default()
        };
        assert_eq!(
            patch.to_changed_filter().unwrap(),
            doc! { "$or": [
                { "price": { "$ne": 65.0 } },
                { "brand": { "$ne": "Acme" } }
            ] }
        );
    }

    #[test]
    fn negative_rating_average_is_rejected_on_update() {
        let patch: UpdateProductRequest =
            serde_json::from_value(json!({ "rating": { "average": -3.0, "count": 1 } })).unwrap();
        assert!(matches!(patch.check(), Err(AppError::Validation(_))));

        let patch: UpdateProductRequest =
            serde_json::from_value(json!({ "rating": { "average": 4.5, "count": 2 } })).unwrap();
        assert!(patch.check().is_ok());
    }

    #[test]
    fn counts_truncate_and_saturate() {
        assert_eq!(to_count(3.9), 3);
        assert_eq!(to_count(-2.0), 0);
        assert_eq!(to_count(f64::NAN), 0);
        assert_eq!(to_count(1e12), u32::MAX);

        let product = create(json!({
            "title": "Boot", "price": 5,
            "rating": { "count": 7.6 },
            "variants": [ { "sizes": [ { "size": "40", "stock": "2.5" } ] } ]
        }))
        .unwrap();
        assert_eq!(product.rating.count, 7);
        assert_eq!(product.variants[0].sizes[0].stock, 2);
    }

    #[test]
    fn loosely_typed_store_documents_still_decode() {
        let stored = doc! {
            "_id": "legacy-1",
            "title": "Old Boot",
            "price": 30,
            "rating": { "average": 4, "count": 12.0 },
            "variants": [ { "color": "tan", "sizes": [
                { "size": "41", "stock": 3.0 },
                { "size": "42", "stock": "5" },
                { "size": "43", "stock": null }
            ] } ],
            "createdAt": bson::DateTime::from_millis(1_709_294_400_000),
            "updatedAt": "yesterday",
        };

        let product: Product = bson::from_document(stored).unwrap();
        assert_eq!(product.rating, Rating { average: 4.0, count: 12 });
        let stock: Vec<u32> = product.variants[0].sizes.iter().map(|s| s.stock).collect();
        assert_eq!(stock, vec![3, 5, 0]);
        assert_eq!(product.created_at, Some(now()));
        assert_eq!(product.updated_at, None);
    }

    #[test]
    fn product_json_uses_storefront_field_names() {
        let mut product = create(json!({ "title": "Shoe A", "price": 50 })).unwrap();
        product.id = Some(ProductId::Legacy("shoe-a".into()));

        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["_id"], "shoe-a");
        assert_eq!(value["discountPrice"], 0.0);
        assert_eq!(value["rating"], json!({ "average": 0.0, "count": 0 }));
        assert!(value.get("createdAt").is_some());
    }
}
