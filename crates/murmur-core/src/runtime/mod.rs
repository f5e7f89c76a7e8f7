//! Runtime - event loop, routing, and flow handling.

pub mod handler;
pub mod menus;
pub mod router;

mod flows;

pub use handler::Bot;
pub use router::{EventRouter, RouteDecision};
