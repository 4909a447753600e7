use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

mod profile_dump;
pub use crate::handlers::profile_dump::dump_profile;

/// Extension point for commands the monitor does not know.
///
/// Returns whether the command was handled; unhandled commands are reported
/// as unknown.
pub trait CommandHandler: Send + Sync {
    fn handle(&self, cmd: &str) -> bool;
}

impl<F> CommandHandler for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn handle(&self, cmd: &str) -> bool {
        self(cmd)
    }
}

static COMMAND_HANDLER: Lazy<RwLock<Option<Arc<dyn CommandHandler>>>> =
    Lazy::new(Default::default);

/// Installs the process-wide handler used by the monitor started with
/// [`crate::start`], replacing any previous one.
pub fn set_command_handler<H>(handler: H)
where
    H: CommandHandler + 'static,
{
    *COMMAND_HANDLER
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
}

/// Removes the process-wide handler. Returns whether one was installed.
pub fn clear_command_handler() -> bool {
    COMMAND_HANDLER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .is_some()
}

pub fn command_handler() -> Option<Arc<dyn CommandHandler>> {
    COMMAND_HANDLER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Delegates to whatever process-wide handler is installed at call time.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalHandler;

impl CommandHandler for GlobalHandler {
    fn handle(&self, cmd: &str) -> bool {
        command_handler().is_some_and(|handler| handler.handle(cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_closure_handler() {
        let handler = |cmd: &str| cmd == "restart-server";
        assert!(handler.handle("restart-server"));
        assert!(!handler.handle("stop"));
    }

    #[test]
    #[serial]
    fn test_global_handler_slot() {
        clear_command_handler();
        assert!(!GlobalHandler.handle("restart-server"));

        set_command_handler(|cmd: &str| cmd == "restart-server");
        assert!(GlobalHandler.handle("restart-server"));
        assert!(!GlobalHandler.handle("other"));

        set_command_handler(|_: &str| false);
        assert!(!GlobalHandler.handle("restart-server"));

        assert!(clear_command_handler());
        assert!(!clear_command_handler());
        assert!(command_handler().is_none());
    }
}
