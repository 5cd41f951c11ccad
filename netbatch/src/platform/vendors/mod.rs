//! Built-in vendor platform definitions.

pub mod arista;
pub mod aruba;
pub mod cisco;
pub mod juniper;

use crate::error::PlatformError;
use crate::platform::PlatformDefinition;

/// All built-in definitions, in registry order.
pub fn builtin() -> Result<Vec<PlatformDefinition>, PlatformError> {
    Ok(vec![
        arista::platform()?,
        aruba::aoscx()?,
        cisco::aireos()?,
        cisco::asa()?,
        cisco::ios()?,
        cisco::iosxr()?,
        cisco::nxos()?,
        cisco::smb()?,
        juniper::platform()?,
    ])
}
