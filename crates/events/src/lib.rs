//! Observer plumbing for client-side state changes.
//!
//! State containers publish change notifications here; dependents (route
//! controller, permission loader) subscribe instead of being called directly
//! by the state owner.

pub mod bus;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
