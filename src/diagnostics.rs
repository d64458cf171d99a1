//! Development logging of instrumentation activity.
//!
//! The core never prints on its own. [`install`] attaches root-bus listeners that
//! log through `tracing`, depending on the configured flags:
//!
//! - `dev`: every `fn-err`, i.e. an error thrown by a wrapped callback
//! - `internal`: every `internal-error`, i.e. a contained fault of the core itself

use crate::agent::Agent;
use crate::bus::Listener;
use crate::config::{FLAG_DEV, FLAG_INTERNAL};
use crate::interceptor::INTERNAL_ERROR;
use tracing::{error, info, warn};

/// Attach the logging listeners enabled by the agent's flags.
///
/// Returns the number of listeners attached.
pub fn install(agent: &Agent) -> usize {
    let root = agent.root();
    let mut installed = 0;

    if agent.config().has_flag(FLAG_INTERNAL) {
        root.on(
            INTERNAL_ERROR,
            Listener::new(|_ctx, args| {
                error!(
                    reason = %args.str_at(0).unwrap_or_default(),
                    event_type = %args.str_at(1).unwrap_or_default(),
                    "internal instrumentation error"
                );
                Ok(())
            }),
        );
        installed += 1;
    }

    if agent.config().has_flag(FLAG_DEV) {
        info!(flags = ?agent.config().flags, "instrumentation in development mode");
        root.on(
            "fn-err",
            Listener::new(|_ctx, args| {
                if let Some(err) = args.error_at(2) {
                    warn!(error = %err, "wrapped callback threw");
                }
                Ok(())
            }),
        );
        installed += 1;
    }

    installed
}

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::function::Function;
    use crate::interceptor::ContextSource;
    use crate::value::{Exception, Value};

    #[test]
    fn test_no_flags_installs_nothing() {
        let agent = Agent::default();
        assert_eq!(install(&agent), 0);
        assert!(agent.root().listeners(INTERNAL_ERROR).is_empty());
    }

    #[test]
    fn test_flags_install_listeners() {
        let config = LoaderConfig::default().with_flag(FLAG_DEV).with_flag(FLAG_INTERNAL);
        let agent = Agent::new(config);

        assert_eq!(install(&agent), 2);
        assert_eq!(agent.root().listeners(INTERNAL_ERROR).len(), 1);
        assert_eq!(agent.root().listeners("fn-err").len(), 1);
    }

    #[test]
    fn test_logging_listener_does_not_disturb_calls() {
        init_tracing();
        let agent = Agent::new(LoaderConfig::default().with_flag(FLAG_DEV));
        install(&agent);
        let failing = Function::new("cb", 0, |_this, _args| Err(Exception::new("logged")));

        let wrapped = agent
            .interceptor("timer")
            .wrap_function(&failing, "fn-", ContextSource::Fresh, None);
        let err = wrapped.call(&Value::Undefined, vec![]).unwrap_err();

        assert_eq!(err.message(), "logged");
        assert_eq!(agent.internal_error_count(), 0);
    }
}
