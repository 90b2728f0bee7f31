// Логирование
//
// Ядро пишет только через `tracing`; подписчика ставит хост-приложение.
// `init_logging` нужен для CLI-хостов и тестов.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Установить fmt-подписчик в stderr с фильтром из `RUST_LOG`
/// (или `default_filter`). stdout остаётся хосту.
///
/// Повторный вызов ничего не делает.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
