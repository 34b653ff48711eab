/// Render jobs are identified by random UUIDs handed back at submission.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Scene-space points, directions and linear RGB colours.
pub type Vec3 = glam::DVec3;
