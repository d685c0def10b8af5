pub mod bouquet;
pub mod lost_flowers;
pub mod session;
pub mod user;

pub use bouquet::{Bouquet, Bouquets, Composition, Resolution};
pub use lost_flowers::LostFlowers;
pub use session::Awaiting;
pub use user::{Role, UserDirectory, UserRecord};
