// Время

use chrono::Utc;

/// Получить текущий timestamp в секундах с UNIX epoch (i64)
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Получить текущее время в миллисекундах с UNIX epoch
pub fn current_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}
