use std::backtrace::Backtrace;

use tracing_subscriber::EnvFilter;

use crate::scheduler::panic_message;

pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("incursion_watch=info".parse()?),
        )
        .init();
    Ok(())
}

/// Route panics through `tracing` with the panic location and a backtrace
/// captured at the panic site. Job panics are still caught by the scheduler.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let message = panic_message(info.payload());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();

        tracing::error!(
            panic = %message,
            location = %location,
            backtrace = %Backtrace::force_capture(),
            "Panic"
        );
    }));
}
