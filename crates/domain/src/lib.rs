pub mod entities;
pub mod messaging;
pub mod ports;
pub mod repositories;
pub mod value_objects;

pub use entities::*;
pub use messaging::*;
pub use ports::*;
pub use repositories::*;
pub use tenantd_errors::{TenantError, TenantResult};
pub use value_objects::*;
