use bson::{Document, doc, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

pub type DaoResult<T> = Result<T, DaoError>;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("not found")]
    NotFound,
    #[error("validation: {0}")]
    Validation(String),
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
    #[error(transparent)]
    BsonSer(#[from] bson::ser::Error),
    #[error(transparent)]
    BsonDe(#[from] bson::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    50
}

#[derive(Debug, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Thin typed wrapper over one MongoDB collection.
pub struct BaseDao<T: Send + Sync> {
    collection: Collection<T>,
}

impl<T> BaseDao<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(db: &Database, name: &str) -> Self {
        Self {
            collection: db.collection::<T>(name),
        }
    }

    pub async fn insert_one(&self, item: &T) -> DaoResult<ObjectId> {
        let result = self.collection.insert_one(item).await?;
        result
            .inserted_id
            .as_object_id()
            .ok_or(DaoError::Validation("inserted id is not an ObjectId".to_string()))
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<T> {
        self.collection
            .find_one(doc! { "_id": id })
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn find_one(&self, filter: Document) -> DaoResult<Option<T>> {
        Ok(self.collection.find_one(filter).await?)
    }

    pub async fn find_many(&self, filter: Document, sort: Option<Document>) -> DaoResult<Vec<T>> {
        let mut query = self.collection.find(filter);
        if let Some(sort) = sort {
            query = query.sort(sort);
        }
        Ok(query.await?.try_collect().await?)
    }

    pub async fn find_paginated(
        &self,
        filter: Document,
        sort: Document,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<T>> {
        let page = params.page.max(1);
        let per_page = params.per_page.clamp(1, 200);
        let total = self.collection.count_documents(filter.clone()).await?;

        let items = self
            .collection
            .find(filter)
            .sort(sort)
            .skip((page - 1) * per_page)
            .limit(per_page as i64)
            .await?
            .try_collect()
            .await?;

        Ok(PaginatedResult {
            items,
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        })
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> DaoResult<()> {
        let result = self.collection.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }
}
