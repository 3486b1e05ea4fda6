use async_trait::async_trait;
use camfeed_db::models::audit_log::AuditLog;
use camfeed_db::models::camera::Camera;
use camfeed_db::models::producer::Producer;
use camfeed_db::models::stream::{Stream, StreamState};
use mongodb::Database;
use serde_json::Value;
use uuid::Uuid;

use crate::dao::{BaseDao, DaoResult};

/// Narrow persistence seam the orchestration layer talks to. Kept as a
/// trait so scenario tests can swap in an in-memory fake without a live
/// MongoDB instance.
#[async_trait]
pub trait StreamRepository: Send + Sync {
    async fn get_camera(&self, camera_id: Uuid) -> DaoResult<Camera>;
    async fn get_stream(&self, stream_id: Uuid) -> DaoResult<Stream>;
    async fn find_active_stream_for_camera(&self, camera_id: Uuid) -> DaoResult<Option<Stream>>;
    async fn insert_stream(&self, stream: &Stream) -> DaoResult<()>;
    async fn transition_stream(
        &self,
        stream_id: Uuid,
        from: StreamState,
        to: StreamState,
        reason: &str,
        actor: camfeed_db::models::stream::AuditActor,
        metadata: Value,
        patch: bson::Document,
    ) -> DaoResult<bool>;
    async fn insert_producer(&self, producer: &Producer) -> DaoResult<()>;
    async fn close_producer(&self, producer_id: Uuid) -> DaoResult<bool>;
    async fn find_active_producer(&self, stream_id: Uuid) -> DaoResult<Option<Producer>>;
    async fn list_live_streams(&self) -> DaoResult<Vec<Stream>>;
    async fn list_streams(&self) -> DaoResult<Vec<Stream>>;
}

/// MongoDB-backed implementation, wiring the generic `BaseDao` over the
/// ingestion entities.
pub struct MongoStreamRepository {
    cameras: BaseDao<Camera>,
    streams: BaseDao<Stream>,
    producers: BaseDao<Producer>,
    audit_logs: BaseDao<AuditLog>,
}

impl MongoStreamRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            cameras: BaseDao::new(db, Camera::COLLECTION),
            streams: BaseDao::new(db, Stream::COLLECTION),
            producers: BaseDao::new(db, Producer::COLLECTION),
            audit_logs: BaseDao::new(db, AuditLog::COLLECTION),
        }
    }
}

#[async_trait]
impl StreamRepository for MongoStreamRepository {
    async fn get_camera(&self, camera_id: Uuid) -> DaoResult<Camera> {
        self.cameras.find_by_id(camera_id).await
    }

    async fn get_stream(&self, stream_id: Uuid) -> DaoResult<Stream> {
        self.streams.find_by_id(stream_id).await
    }

    async fn find_active_stream_for_camera(&self, camera_id: Uuid) -> DaoResult<Option<Stream>> {
        self.streams
            .find_one(bson::doc! {
                "camera_id": camera_id.to_string(),
                "state": { "$nin": ["closed"] },
            })
            .await
    }

    async fn insert_stream(&self, stream: &Stream) -> DaoResult<()> {
        self.streams.insert_one(stream).await
    }

    async fn transition_stream(
        &self,
        stream_id: Uuid,
        from: StreamState,
        to: StreamState,
        reason: &str,
        actor: camfeed_db::models::stream::AuditActor,
        metadata: Value,
        patch: bson::Document,
    ) -> DaoResult<bool> {
        // Compare-and-swap on the current state, so a concurrent writer
        // can never advance a stream out from under a stale read.
        let filter = bson::doc! {
            "_id": stream_id.to_string(),
            "state": from.as_str(),
        };
        let mut set_doc = patch;
        set_doc.insert("state", to.as_str());
        let update = bson::doc! { "$set": set_doc };

        let applied = self.streams.update_one(filter, update).await?;
        if applied {
            let log = AuditLog::new(stream_id, from.as_str(), to.as_str(), reason, actor, metadata);
            self.audit_logs.insert_one(&log).await?;
        }
        Ok(applied)
    }

    async fn insert_producer(&self, producer: &Producer) -> DaoResult<()> {
        self.producers.insert_one(producer).await
    }

    async fn close_producer(&self, producer_id: Uuid) -> DaoResult<bool> {
        self.producers
            .update_by_id(
                producer_id,
                bson::doc! { "$set": {
                    "state": "closed",
                    "closed_at": bson::DateTime::now(),
                }},
            )
            .await
    }

    async fn find_active_producer(&self, stream_id: Uuid) -> DaoResult<Option<Producer>> {
        self.producers
            .find_one(bson::doc! {
                "stream_id": stream_id.to_string(),
                "state": "active",
            })
            .await
    }

    async fn list_live_streams(&self) -> DaoResult<Vec<Stream>> {
        self.streams
            .find_many(bson::doc! { "state": "live" }, None)
            .await
    }

    async fn list_streams(&self) -> DaoResult<Vec<Stream>> {
        self.streams
            .find_many(bson::doc! {}, Some(bson::doc! { "created_at": -1 }))
            .await
    }
}
