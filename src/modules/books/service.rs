//! Catalog service: validation, coercion, and record composition.

use std::{io, sync::Arc};

use thiserror::Error;
use time::OffsetDateTime;

use super::{
    models::{Book, BookSubmission, ImageUpload, NewBook, REQUIRED_FIELDS},
    store::{BookStore, StoreError},
    uploads::UploadStore,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("invalid numeric fields: {}", .0.join(", "))]
    InvalidNumbers(Vec<&'static str>),

    #[error("failed to store upload: {0}")]
    Upload(#[source] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Submission that passed validation, with numeric fields coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub name: String,
    pub quantity: u32,
    pub author: String,
    pub category: String,
    pub description: String,
    pub rating: f64,
}

impl ValidSubmission {
    fn into_new_book(self, image_url: Option<String>, created_at: OffsetDateTime) -> NewBook {
        NewBook {
            name: self.name,
            quantity: self.quantity,
            author: self.author,
            category: self.category,
            description: self.description,
            rating: self.rating,
            image_url,
            created_at,
        }
    }
}

/// Check that all six fields are present and non-empty, then parse
/// `quantity` as a base-10 integer and `rating` as a finite float.
pub fn validate(submission: BookSubmission) -> Result<ValidSubmission, CatalogError> {
    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .into_iter()
        .filter(|field| submission.field(field).map_or(true, str::is_empty))
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::MissingFields(missing));
    }

    let quantity = submission
        .quantity
        .as_deref()
        .and_then(|raw| raw.trim().parse::<u32>().ok());
    let rating = submission
        .rating
        .as_deref()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|rating| rating.is_finite());

    let (quantity, rating) = match (quantity, rating) {
        (Some(quantity), Some(rating)) => (quantity, rating),
        (quantity, rating) => {
            let mut invalid = Vec::new();
            if quantity.is_none() {
                invalid.push("quantity");
            }
            if rating.is_none() {
                invalid.push("rating");
            }
            return Err(CatalogError::InvalidNumbers(invalid));
        }
    };

    Ok(ValidSubmission {
        name: submission.name.unwrap_or_default(),
        quantity,
        author: submission.author.unwrap_or_default(),
        category: submission.category.unwrap_or_default(),
        description: submission.description.unwrap_or_default(),
        rating,
    })
}

pub struct CatalogService {
    store: Arc<dyn BookStore>,
    uploads: UploadStore,
}

impl CatalogService {
    pub fn new(store: Arc<dyn BookStore>, uploads: UploadStore) -> Self {
        Self { store, uploads }
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Every book in insertion order.
    pub async fn list(&self) -> Result<Vec<Book>, CatalogError> {
        Ok(self.store.find_all().await?)
    }

    /// Validate, store the image if any, and insert the record.
    ///
    /// Nothing is written when validation fails. The image and the record are
    /// separate writes: an insert failure leaves the image on disk.
    pub async fn create(
        &self,
        submission: BookSubmission,
        image: Option<ImageUpload>,
    ) -> Result<String, CatalogError> {
        let valid = validate(submission)?;

        let image_url = match image {
            Some(image) => {
                let filename = self
                    .uploads
                    .save(&image.data, &image.file_name)
                    .await
                    .map_err(CatalogError::Upload)?;
                Some(UploadStore::served_path(&filename))
            }
            None => None,
        };

        let book = valid.into_new_book(image_url, OffsetDateTime::now_utc());
        let name = book.name.clone();
        let id = self.store.insert_one(book).await?;

        tracing::info!(book_id = %id, %name, "book added");
        Ok(id)
    }
}
