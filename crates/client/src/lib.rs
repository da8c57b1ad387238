pub mod api;
pub mod http;
pub mod memory;
pub mod retry;
pub mod service;
pub mod session;
pub mod wire;

pub use api::{BookingBackend, BookingScope};
pub use http::HttpBookingBackend;
pub use memory::MemoryBookingBackend;
pub use retry::ReadRetryPolicy;
pub use service::BookingService;
pub use session::{Session, SessionContext};
