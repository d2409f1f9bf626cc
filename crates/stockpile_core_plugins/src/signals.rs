//! Host lifecycle signal plugin.

use stockpile_system::plugin::Plugin;
use stockpile_system::server::Server;
use stockpile_system::signal::HostSignals;

/// Registers the [`HostSignals`] API and emits `Shutdown` when the server
/// cleans up.
///
/// An existing `HostSignals` (inserted by the host before `finish()`) is
/// kept, so the host can hold a clone from the start.
///
/// # Resources Provided
///
/// | Resource | Kind | Description |
/// |----------|------|-------------|
/// | [`HostSignals`] | API | Scope begin/end and shutdown notifications |
///
/// # Example
///
/// ```
/// use stockpile_core_plugins::SignalsPlugin;
/// use stockpile_system::server::Server;
/// use stockpile_system::signal::HostSignals;
///
/// let mut server = Server::new();
/// server.add_plugins(SignalsPlugin);
/// server.finish();
///
/// let signals = server.api::<HostSignals>().unwrap().clone();
/// let scope = signals.begin_scope("title-screen");
/// assert_eq!(signals.live_scopes(), vec![scope]);
///
/// server.cleanup();
/// assert!(signals.is_shut_down());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalsPlugin;

impl Plugin for SignalsPlugin {
    fn build(&self, server: &mut Server) {
        if !server.contains_api::<HostSignals>() {
            server.insert_api(HostSignals::new());
        }
    }

    fn cleanup(&self, server: &mut Server) {
        if let Some(signals) = server.api::<HostSignals>()
            && signals.shutdown()
        {
            tracing::debug!(
                live_scopes = signals.live_scopes().len(),
                "shutdown signal emitted"
            );
        }
    }
}
