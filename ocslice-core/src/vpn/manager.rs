//! Session manager
//!
//! Front door for every session operation. Holds the credential store, the
//! supervisor and the teardown, and guards against overlapping connects.

use crate::auth::credentials::{clear_user_secrets, store_secret, stored_secret_status};
use crate::auth::{CredentialStore, KeyringStore, StoredSecrets};
use crate::config::toml_config::{save_config_to_path, TomlConfig};
use crate::config::{HelperConfig, TimingConfig, VpnConfig};
use crate::error::{CredentialError, SliceError, VpnError};
use crate::types::{SecretPurpose, SecretValue};
use crate::vpn::elevation::{Elevator, SudoElevator};
use crate::vpn::probe::{SessionProbe, SystemProbe};
use crate::vpn::state::ConnectionState;
use crate::vpn::supervisor::{ConnectHandle, Supervisor};
use crate::vpn::teardown::Teardown;
use crate::vpn::tunnel_log::TunnelLog;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Outcome of an operation as `{"success": bool, "message": string}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub success: bool,
    pub message: String,
}

impl Reply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl<E: std::fmt::Display> From<Result<String, E>> for Reply {
    fn from(result: Result<String, E>) -> Self {
        match result {
            Ok(message) => Reply::ok(message),
            Err(e) => Reply::failed(e.to_string()),
        }
    }
}

/// Probe result as `{"connected": bool}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReply {
    pub connected: bool,
}

pub struct SessionManager<P: SessionProbe = SystemProbe, E: Elevator = SudoElevator> {
    store: Arc<dyn CredentialStore>,
    supervisor: Supervisor<P>,
    teardown: Teardown<E, P>,
    pending: Mutex<Option<ConnectHandle>>,
}

impl SessionManager {
    /// Manager wired to the system keyring, probe and sudo
    ///
    /// Tunnel output goes to `log`.
    pub fn system(helpers: HelperConfig, timing: TimingConfig, log: TunnelLog) -> Self {
        let probe = Arc::new(SystemProbe::default());
        let elevator = SudoElevator::new(&helpers.elevation_program);
        let teardown = Teardown::new(elevator, Arc::clone(&probe), timing.clone());
        let supervisor = Supervisor::new(probe, helpers, timing).with_log(log);

        Self::new(Arc::new(KeyringStore::new()), supervisor, teardown)
    }
}

impl<P: SessionProbe, E: Elevator> SessionManager<P, E> {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        supervisor: Supervisor<P>,
        teardown: Teardown<E, P>,
    ) -> Self {
        Self {
            store,
            supervisor,
            teardown,
            pending: Mutex::new(None),
        }
    }

    /// Start a background connection attempt
    ///
    /// Returns the acceptance message once the preconditions hold. The
    /// verdict is collected with [`SessionManager::wait_for_connect`] or by
    /// polling [`SessionManager::is_connected`].
    pub fn connect(&self, config: VpnConfig) -> Result<String, VpnError> {
        let mut pending = self.pending_slot();

        if pending.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(VpnError::AttemptInProgress);
        }

        let handle = self.supervisor.connect(config, self.store.as_ref())?;
        let message = handle.message().to_string();
        *pending = Some(handle);
        Ok(message)
    }

    /// Wait for the verdict of the last background attempt
    ///
    /// Returns `None` when no attempt was started since the last call. The
    /// attempt stays registered while it is awaited, so a concurrent
    /// [`SessionManager::connect`] is still refused.
    pub async fn wait_for_connect(&self) -> Option<Result<String, VpnError>> {
        let handle = self.pending_slot().clone()?;

        let outcome = handle.outcome().await;
        info!("Background connection finished: {}", outcome);

        {
            let mut pending = self.pending_slot();
            if pending
                .as_ref()
                .is_some_and(|current| current.is_same_attempt(&handle))
            {
                *pending = None;
            }
        }
        Some(outcome.into())
    }

    fn pending_slot(&self) -> MutexGuard<'_, Option<ConnectHandle>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Connect and wait for the verdict
    pub async fn connect_direct(&self, config: VpnConfig) -> Result<String, VpnError> {
        let outcome = self
            .supervisor
            .connect_direct(config, self.store.as_ref())
            .await?;
        outcome.into()
    }

    /// Tear the tunnel down
    pub async fn disconnect(&self, config: VpnConfig) -> Result<String, VpnError> {
        self.teardown
            .disconnect(self.store.as_ref(), &config.username)
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.supervisor.probe().is_connected()
    }

    pub fn status(&self) -> StatusReply {
        StatusReply {
            connected: self.is_connected(),
        }
    }

    /// Current state; `Connecting` while a background attempt runs
    pub fn state(&self) -> ConnectionState {
        let in_flight = self
            .pending_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());

        if in_flight {
            ConnectionState::Connecting
        } else {
            ConnectionState::observed(self.is_connected())
        }
    }

    pub fn stored_secrets(&self, username: &str) -> StoredSecrets {
        stored_secret_status(self.store.as_ref(), username)
    }

    /// Store a secret; an empty value leaves the stored one untouched
    pub fn store_secret(
        &self,
        username: &str,
        purpose: SecretPurpose,
        value: &SecretValue,
    ) -> Result<bool, CredentialError> {
        if value.is_empty() {
            return Ok(false);
        }
        store_secret(self.store.as_ref(), username, purpose, value)?;
        Ok(true)
    }

    pub fn clear_secrets(&self, username: &str) {
        clear_user_secrets(self.store.as_ref(), username);
    }

    /// Persist settings, dropping the secrets of a replaced username
    pub fn save_settings(
        &self,
        previous_username: &str,
        config: &mut TomlConfig,
        path: &Path,
    ) -> Result<(), SliceError> {
        let username = config.vpn_config.username.as_str();
        if !previous_username.is_empty() && previous_username != username {
            warn!(
                "Username changed from {} to {}, clearing old secrets",
                previous_username, username
            );
            self.clear_secrets(previous_username);
        }

        save_config_to_path(config, path)
    }
}
