use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Form fields every submission must carry, in the order they are reported.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "name",
    "quantity",
    "author",
    "category",
    "description",
    "rating",
];

/// Multipart part carrying the optional cover image.
pub const IMAGE_FIELD: &str = "image";

/// A stored catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Identifier assigned by the storage backend
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub author: String,
    pub category: String,
    pub description: String,
    pub rating: f64,
    /// Served path of the uploaded image, `null` when none was sent
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
}

/// A composed record that has not been assigned an identifier yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub name: String,
    pub quantity: u32,
    pub author: String,
    pub category: String,
    pub description: String,
    pub rating: f64,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
}

impl NewBook {
    pub fn with_id(self, id: String) -> Book {
        Book {
            id,
            name: self.name,
            quantity: self.quantity,
            author: self.author,
            category: self.category,
            description: self.description,
            rating: self.rating,
            image_url: self.image_url,
            created_at: self.created_at,
        }
    }
}

/// Raw text fields of a create request, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSubmission {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub rating: Option<String>,
}

impl BookSubmission {
    /// Slot for a known form field; `None` for anything else.
    pub fn field_mut(&mut self, field: &str) -> Option<&mut Option<String>> {
        match field {
            "name" => Some(&mut self.name),
            "quantity" => Some(&mut self.quantity),
            "author" => Some(&mut self.author),
            "category" => Some(&mut self.category),
            "description" => Some(&mut self.description),
            "rating" => Some(&mut self.rating),
            _ => None,
        }
    }

    pub fn field(&self, field: &str) -> Option<&str> {
        let value = match field {
            "name" => &self.name,
            "quantity" => &self.quantity,
            "author" => &self.author,
            "category" => &self.category,
            "description" => &self.description,
            "rating" => &self.rating,
            _ => return None,
        };
        value.as_deref()
    }
}

/// Uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub data: axum::body::Bytes,
}

/// Response body of a successful create.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookCreated {
    pub message: String,
    pub book_id: String,
}

/// Shape of the create form, for documentation only.
#[derive(ToSchema)]
#[allow(unused)]
pub struct CreateBookForm {
    name: String,
    /// Base-10 integer
    quantity: String,
    author: String,
    category: String,
    description: String,
    /// Decimal number
    rating: String,
    /// Optional cover image
    #[schema(value_type = String, format = Binary, required = false)]
    image: Option<Vec<u8>>,
}
