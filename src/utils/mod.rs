/// Reply payload codecs
pub mod serialization;
/// Timestamps attached to cached router state
pub mod time;
