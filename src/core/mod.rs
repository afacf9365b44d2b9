pub mod config;
pub mod error;
pub mod types;

pub use config::AllocationSettings;
pub use error::{DevsimError, Result};
pub use types::{BuildingId, Form, Money, ParcelId, SubaccountId, Year};
