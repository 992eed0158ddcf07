use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Rooms
    create_indexes(
        db,
        "rooms",
        vec![
            index(bson::doc! { "event_id": 1, "is_active": 1 }),
            index_unique(bson::doc! { "event_id": 1, "name": 1 }),
        ],
    )
    .await?;

    // Chat messages (durable log; newest-first history reads)
    create_indexes(
        db,
        "chat_messages",
        vec![index(bson::doc! { "room_id": 1, "created_at": -1 })],
    )
    .await?;

    // Room files
    create_indexes(
        db,
        "room_files",
        vec![index(bson::doc! { "room_id": 1, "created_at": 1 })],
    )
    .await?;

    // Membership collections are owned by the identity/ticketing
    // service; we only index the lookups check_permission performs.
    create_indexes(
        db,
        "event_organizers",
        vec![index_unique(bson::doc! { "event_id": 1, "user_id": 1 })],
    )
    .await?;

    create_indexes(
        db,
        "team_members",
        vec![index_unique(bson::doc! { "team_id": 1, "user_id": 1 })],
    )
    .await?;

    create_indexes(
        db,
        "tickets",
        vec![index(bson::doc! { "event_id": 1, "user_id": 1, "status": 1 })],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    let coll = db.collection::<bson::Document>(collection);
    coll.create_indexes(indexes).await?;
    info!(collection, "Indexes created");
    Ok(())
}
