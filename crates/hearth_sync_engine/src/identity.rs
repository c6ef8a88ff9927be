//! Per-installation device identity.

use chrono::Utc;
use hearth_storage::{LocalStore, StoreResult};
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Local key the generated device id is persisted under.
pub const DEFAULT_DEVICE_ID_KEY: &str = "device_id";

/// Id used when the local store cannot provide or persist one.
pub const UNKNOWN_DEVICE: &str = "unknown_device";

/// Opaque identifier of this installation, stamped into every envelope.
///
/// Generated on first use as `device_<unix-millis>_<9 random chars>` and
/// persisted in the local store, so it is stable across restarts. It is
/// never used to break ties between conflicting writes.
///
/// Concurrent first calls to [`resolve`](Self::resolve) share one load, so
/// an installation never generates two ids.
#[derive(Debug)]
pub struct DeviceIdentity {
    storage_key: String,
    cached: OnceCell<String>,
}

impl DeviceIdentity {
    /// Creates an identity persisted under `storage_key`.
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            cached: OnceCell::new(),
        }
    }

    /// Creates an identity that always resolves to `id`.
    pub fn fixed(id: impl Into<String>) -> Self {
        Self {
            storage_key: DEFAULT_DEVICE_ID_KEY.to_string(),
            cached: OnceCell::from(id.into()),
        }
    }

    /// Returns the local key the id is persisted under.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Returns the device id, loading or generating it on first use.
    ///
    /// Falls back to [`UNKNOWN_DEVICE`] if the local store fails; the
    /// fallback is not cached, so a later call retries.
    pub async fn resolve<L: LocalStore + ?Sized>(&self, local: &L) -> String {
        match self
            .cached
            .get_or_try_init(|| self.load_or_create(local))
            .await
        {
            Ok(id) => id.clone(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to resolve device id");
                UNKNOWN_DEVICE.to_string()
            }
        }
    }

    async fn load_or_create<L: LocalStore + ?Sized>(
        &self,
        local: &L,
    ) -> StoreResult<String> {
        if let Some(bytes) = local.get(&self.storage_key).await? {
            if let Ok(id) = String::from_utf8(bytes) {
                let id = id.trim();
                if !id.is_empty() {
                    return Ok(id.to_string());
                }
            }
        }

        let id = generate();
        local.set(&self.storage_key, id.as_bytes()).await?;
        tracing::info!(device_id = %id, "generated device id");
        Ok(id)
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_ID_KEY)
    }
}

fn generate() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("device_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}
