//! Stable per-installation identity, minted on first use and persisted in
//! the meta collection. Exports carry it so the back office can tell
//! devices apart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{Store, META};

const DEVICE_KEY: &str = "device";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub device_id: String,
    pub created_at: String,
}

/// Returns the stored identity, creating and persisting one on first call.
pub fn device_identity(store: &Store) -> Result<DeviceIdentity, StoreError> {
    if let Some(identity) = store.get_doc::<DeviceIdentity>(META, DEVICE_KEY)? {
        return Ok(identity);
    }

    let identity = DeviceIdentity {
        device_id: Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    store.set_doc(META, DEVICE_KEY, &identity)?;
    log::info!("Minted device identity '{}'", identity.device_id);
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_identity_is_stable() {
        let store = Store::open_in_memory().unwrap();

        let first = device_identity(&store).unwrap();
        let second = device_identity(&store).unwrap();
        assert_eq!(first.device_id, second.device_id);
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn test_device_identity_differs_per_store() {
        let a = device_identity(&Store::open_in_memory().unwrap()).unwrap();
        let b = device_identity(&Store::open_in_memory().unwrap()).unwrap();
        assert_ne!(a.device_id, b.device_id);
    }
}
