//! Logging bootstrap for hosts that do not install their own logger

use env_logger::{Builder, Env};

/// Installs `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init() {
    install(&mut builder());
}

fn builder() -> Builder {
    Builder::from_env(Env::default().default_filter_or("info"))
}

/// Returns whether this call installed the global logger
fn install(builder: &mut Builder) -> bool {
    let installed = builder.try_init().is_ok();
    if installed {
        log::debug!("tilelet logging initialised");
    }
    installed
}
