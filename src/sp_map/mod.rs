//! Service-provider map
//!
//! Process-wide `endpoint → spId` cache owned by the service and refreshed
//! from the registry. Used to confirm that a replica recorded against a
//! user still belongs to the same service provider.

mod errors;
mod manager;

pub use errors::{SpMapError, SpMapResult};
pub use manager::{EndpointMap, SpIdMapManager};
