mod presence;
mod role;
mod role_resolver;

pub use presence::*;
pub use role::*;
pub use role_resolver::*;
