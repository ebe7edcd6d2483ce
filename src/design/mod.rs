//! Design description: materials, objects, layers and nets.
//!
//! A [`Design`] is what a configuration file describes once every name has
//! been resolved to an index. Layers are owned by the design's
//! [`Space`](crate::mesh::Space), which stacks them by z-order.

mod registry;
mod types;
mod validate;

pub use registry::Design;
pub use types::*;
pub use validate::validate_design;
