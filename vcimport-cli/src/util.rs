//! Shared utility functions used across command modules.

use std::path::Path;

use secrecy::SecretString;
use vcimport_core::config::{AppSettings, ConfigManager};
use vcimport_core::connection::ConnectionManager;
use vcimport_core::import::{CancelHandle, ConnectTarget};
use vcimport_core::one::OneClient;

use crate::cli::TargetArgs;
use crate::error::{CliError, exit_codes};

/// Creates a `ConfigManager` using the optional custom config directory
/// from CLI args.
pub fn create_config_manager(config_path: Option<&Path>) -> Result<ConfigManager, CliError> {
    match config_path {
        Some(path) => Ok(ConfigManager::with_config_dir(path.to_path_buf())),
        None => ConfigManager::new()
            .map_err(|e| CliError::Config(format!("Failed to initialize config: {e}"))),
    }
}

/// Loads the settings file with environment overrides applied
pub fn load_settings(config_path: Option<&Path>) -> Result<AppSettings, CliError> {
    create_config_manager(config_path)?
        .load_effective_settings()
        .map_err(|e| CliError::Config(format!("Failed to load settings: {e}")))
}

/// XML-RPC client for the OpenNebula endpoint of `settings`
pub fn target_client(settings: &AppSettings) -> Result<OneClient, CliError> {
    let session = settings
        .one
        .read_session()
        .map_err(|e| CliError::Config(e.to_string()))?;
    OneClient::new(&settings.one.endpoint, session).map_err(|e| CliError::Target(e.to_string()))
}

/// Resolves the connect target from the command line
///
/// A direct target without `--vpass` prompts for the password.
pub fn connect_target(args: &TargetArgs, manager: &ConnectionManager) -> Result<ConnectTarget, CliError> {
    if let Some(id) = args.host_id {
        return Ok(ConnectTarget::ManagedHost(id));
    }
    if let Some(name) = &args.host_name {
        return Ok(ConnectTarget::HostName(name.clone()));
    }
    let Some(host) = &args.vcenter else {
        return Err(CliError::Config(
            "one of --vcenter, --host-id or --host-name is required".to_string(),
        ));
    };
    let user = args
        .vuser
        .clone()
        .ok_or_else(|| CliError::Config("--vuser is required with --vcenter".to_string()))?;
    let password = match &args.vpass {
        Some(password) => SecretString::from(password.clone()),
        None => read_password(&user, host)?,
    };

    let mut options = manager.options(host, &user, password);
    if let Some(pool) = &args.resource_pool {
        options = options.with_resource_pool(pool.clone());
    }
    if args.strict_tls {
        options = options.with_strict_tls(true);
    }
    Ok(ConnectTarget::Direct(options))
}

fn read_password(user: &str, host: &str) -> Result<SecretString, CliError> {
    let password = rpassword::prompt_password(format!("Password for {user}@{host}: "))?;
    Ok(SecretString::from(password))
}

/// How the interrupt listener ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// Ctrl+C pressed again after the run was asked to stop
    Abort,
    /// Signals can no longer be received
    ListenerGone,
}

/// Relays interrupts to `cancel` until the operator insists
///
/// The first signal asks the run to stop after the current item, which
/// still closes the vCenter session. A second signal ends the relay with
/// [`InterruptOutcome::Abort`].
pub async fn relay_interrupts<F, Fut>(mut next_signal: F, cancel: CancelHandle) -> InterruptOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    loop {
        if let Err(e) = next_signal().await {
            tracing::warn!(error = %e, "interrupt listener stopped");
            return InterruptOutcome::ListenerGone;
        }
        if cancel.is_cancelled() {
            tracing::warn!("second interrupt, aborting");
            return InterruptOutcome::Abort;
        }
        tracing::warn!("interrupt received, finishing the current item");
        eprintln!("Interrupted: stopping after the current item (press Ctrl+C again to abort now)");
        cancel.cancel();
    }
}

/// Flips `cancel` on Ctrl+C and exits with the cancelled status on a second one
///
/// The listener runs on its own thread with a single-threaded runtime, so
/// the blocking import keeps the main thread. A forced abort cannot log out
/// a session owned by the main thread; vCenter expires it.
pub fn install_interrupt_handler(cancel: CancelHandle) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .map_err(|e| CliError::Config(format!("Failed to create signal runtime: {e}")))?;
    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let outcome = runtime.block_on(relay_interrupts(tokio::signal::ctrl_c, cancel));
            if outcome == InterruptOutcome::Abort {
                eprintln!("Error: {}", CliError::Cancelled);
                std::process::exit(exit_codes::CANCELLED);
            }
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::TargetArgs;

    #[test]
    fn managed_host_wins_without_prompting() {
        let args = TargetArgs {
            host_id: Some(4),
            ..TargetArgs::default()
        };
        let target = connect_target(&args, &ConnectionManager::default()).unwrap();
        assert!(matches!(target, ConnectTarget::ManagedHost(4)));
    }

    #[test]
    fn direct_target_carries_options() {
        let args = TargetArgs {
            vcenter: Some("vc.local".to_string()),
            vuser: Some("admin".to_string()),
            vpass: Some("pw".to_string()),
            resource_pool: Some("resgroup-9".to_string()),
            strict_tls: true,
            ..TargetArgs::default()
        };
        let ConnectTarget::Direct(options) = connect_target(&args, &ConnectionManager::default()).unwrap() else {
            panic!("expected a direct target");
        };
        assert_eq!(options.host, "vc.local");
        assert_eq!(options.user, "admin");
        assert_eq!(options.resource_pool.as_deref(), Some("resgroup-9"));
        assert!(!options.accept_invalid_certs);
    }

    #[tokio::test]
    async fn first_interrupt_only_cancels() {
        let cancel = CancelHandle::new();
        let mut signals = 1;
        let next_signal = move || {
            let result = if signals > 0 {
                signals -= 1;
                Ok(())
            } else {
                Err(std::io::Error::other("signal stream closed"))
            };
            async move { result }
        };

        let outcome = relay_interrupts(next_signal, cancel.clone()).await;
        assert_eq!(outcome, InterruptOutcome::ListenerGone);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn second_interrupt_aborts() {
        let cancel = CancelHandle::new();
        let outcome = relay_interrupts(|| async { Ok(()) }, cancel.clone()).await;
        assert_eq!(outcome, InterruptOutcome::Abort);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn listener_failure_leaves_the_run_alone() {
        let cancel = CancelHandle::new();
        let outcome = relay_interrupts(
            || async { Err(std::io::Error::other("no signal support")) },
            cancel.clone(),
        )
        .await;
        assert_eq!(outcome, InterruptOutcome::ListenerGone);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn missing_target_is_a_config_error() {
        let err = connect_target(&TargetArgs::default(), &ConnectionManager::default()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
