//! Small helpers that sit beside the dispatcher.

pub mod cookie;
pub mod email;
pub mod throttle;
pub mod unique;

pub use cookie::CookieJar;
pub use email::is_email;
pub use throttle::Throttle;
pub use unique::unique;
