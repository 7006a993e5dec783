//! Data models for Campus Swap

pub mod item;
pub mod request;
pub mod trust;
pub mod turf;
pub mod user;

// Re-export commonly used types
pub use item::{Item, ItemStatus};
pub use request::{ExchangeRequest, RequestStatus, RequestView};
pub use trust::{TrustSummary, TrustTier};
pub use turf::{SlotKey, TurfBooking};
pub use user::{Actor, Role, User};
