pub mod resolver;
pub mod snapshot;

pub use resolver::{OverrideResolver, Resolution};
pub use snapshot::RequestSnapshot;
