pub mod entity;
pub mod fade;
pub mod layer;
pub mod node;
pub mod signal;
pub mod tracer;

pub use entity::{Entity, EntityId, Position, SceneView, canvas_pos};
pub use fade::{Fade, FadeDirection, FadePoll};
pub use layer::Layer;
pub use node::{Node, build_chain, chain_from_positions};
pub use signal::{Signal, calculate_waypoints};
pub use tracer::Tracer;
