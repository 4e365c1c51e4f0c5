//! API group implementations.

mod batch_v1;
mod core_v1;
mod custom_objects;

pub use batch_v1::BatchV1Api;
pub use core_v1::{CoreV1Api, ListPodsQuery, PodLogQuery};
pub use custom_objects::CustomObjectsApi;
