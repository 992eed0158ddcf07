use bson::{doc, oid::ObjectId};
use huddle_db::models::UploadedFile;
use mongodb::Database;

use super::base::{BaseDao, DaoResult};

pub struct FileDao {
    pub base: BaseDao<UploadedFile>,
}

impl FileDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, UploadedFile::COLLECTION),
        }
    }

    pub async fn insert(&self, file: &UploadedFile) -> DaoResult<ObjectId> {
        self.base.insert_one(file).await
    }

    pub async fn find_in_room(&self, room_id: ObjectId) -> DaoResult<Vec<UploadedFile>> {
        self.base
            .find_many(doc! { "room_id": room_id }, Some(doc! { "created_at": 1 }))
            .await
    }
}
