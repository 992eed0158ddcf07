use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use mongodb::Database;

use crate::error::{EngineError, EngineResult};

/// Boundary to the external identity/ticketing service. The engine
/// only ever asks three yes/no questions; how organizers, teams and
/// tickets are managed is not its concern.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn organizes_event(&self, user_id: &ObjectId, event_id: &ObjectId)
    -> EngineResult<bool>;
    async fn is_team_member(&self, user_id: &ObjectId, team_id: &ObjectId) -> EngineResult<bool>;
    async fn holds_ticket(&self, user_id: &ObjectId, event_id: &ObjectId) -> EngineResult<bool>;
}

/// Reads the membership collections the identity service maintains in
/// the shared database.
pub struct MongoMembership {
    db: Database,
}

impl MongoMembership {
    pub fn new(db: &Database) -> Self {
        Self { db: db.clone() }
    }

    async fn exists(&self, collection: &str, filter: bson::Document) -> EngineResult<bool> {
        let count = self
            .db
            .collection::<bson::Document>(collection)
            .count_documents(filter)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(count > 0)
    }
}

#[async_trait]
impl MembershipProvider for MongoMembership {
    async fn organizes_event(
        &self,
        user_id: &ObjectId,
        event_id: &ObjectId,
    ) -> EngineResult<bool> {
        self.exists(
            "event_organizers",
            doc! { "event_id": event_id, "user_id": user_id },
        )
        .await
    }

    async fn is_team_member(&self, user_id: &ObjectId, team_id: &ObjectId) -> EngineResult<bool> {
        self.exists(
            "team_members",
            doc! { "team_id": team_id, "user_id": user_id },
        )
        .await
    }

    async fn holds_ticket(&self, user_id: &ObjectId, event_id: &ObjectId) -> EngineResult<bool> {
        self.exists(
            "tickets",
            doc! { "event_id": event_id, "user_id": user_id, "status": "valid" },
        )
        .await
    }
}

/// Fixture provider with hand-seeded facts; the tests crate drives the
/// engine against this instead of a database.
#[derive(Default)]
pub struct StaticMembership {
    organizers: RwLock<HashSet<(ObjectId, ObjectId)>>,
    team_members: RwLock<HashSet<(ObjectId, ObjectId)>>,
    tickets: RwLock<HashSet<(ObjectId, ObjectId)>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_organizer(&self, user_id: ObjectId, event_id: ObjectId) {
        self.organizers.write().unwrap().insert((user_id, event_id));
    }

    pub fn add_team_member(&self, user_id: ObjectId, team_id: ObjectId) {
        self.team_members.write().unwrap().insert((user_id, team_id));
    }

    pub fn add_ticket(&self, user_id: ObjectId, event_id: ObjectId) {
        self.tickets.write().unwrap().insert((user_id, event_id));
    }
}

#[async_trait]
impl MembershipProvider for StaticMembership {
    async fn organizes_event(
        &self,
        user_id: &ObjectId,
        event_id: &ObjectId,
    ) -> EngineResult<bool> {
        Ok(self.organizers.read().unwrap().contains(&(*user_id, *event_id)))
    }

    async fn is_team_member(&self, user_id: &ObjectId, team_id: &ObjectId) -> EngineResult<bool> {
        Ok(self.team_members.read().unwrap().contains(&(*user_id, *team_id)))
    }

    async fn holds_ticket(&self, user_id: &ObjectId, event_id: &ObjectId) -> EngineResult<bool> {
        Ok(self.tickets.read().unwrap().contains(&(*user_id, *event_id)))
    }
}
