use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{audit_log::AuditLog, camera::Camera, consumer::Consumer, producer::Producer, stream::Stream};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Cameras
    create_indexes(
        db,
        Camera::COLLECTION,
        vec![index(bson::doc! { "name": 1 })],
    )
    .await?;

    // Streams — at most one non-CLOSED stream per camera is enforced in
    // the orchestrator, not by a unique index, since CLOSED rows are kept
    // for history.
    create_indexes(
        db,
        Stream::COLLECTION,
        vec![
            index(bson::doc! { "camera_id": 1, "created_at": -1 }),
            index(bson::doc! { "state": 1 }),
        ],
    )
    .await?;

    // Producers
    create_indexes(
        db,
        Producer::COLLECTION,
        vec![
            index(bson::doc! { "stream_id": 1, "state": 1 }),
            index(bson::doc! { "router_producer_id": 1 }),
        ],
    )
    .await?;

    // Consumers
    create_indexes(
        db,
        Consumer::COLLECTION,
        vec![index(bson::doc! { "stream_id": 1 })],
    )
    .await?;

    // Audit Logs
    create_indexes(
        db,
        AuditLog::COLLECTION,
        vec![index(bson::doc! { "stream_id": 1, "created_at": -1 })],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

#[allow(dead_code)]
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
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
