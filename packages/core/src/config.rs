//! Централизованная конфигурация для Construct Hybrid Core
//!
//! Размеры публичных ключей, версия формата и лимиты кешей определены здесь.
//! Размеры, зафиксированные самими алгоритмами (nonce, теги), живут
//! константами рядом с кодом, который их использует.

use std::sync::OnceLock;

/// Глобальная конфигурация приложения (синглтон)
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Основная структура конфигурации
#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // РАЗМЕРЫ КЛЮЧЕЙ
    // ============================================
    /// Размер публичного/приватного ключа X25519 (в байтах)
    pub classical_key_size: usize,

    /// Размер публичного ключа ML-KEM-768 (в байтах)
    pub pq_public_key_size: usize,

    /// Размер общего секрета и итогового сессионного ключа (в байтах)
    pub shared_secret_size: usize,

    // ============================================
    // ФОРМАТ КОНВЕРТА
    // ============================================
    /// Версия формата, которой запечатываются новые конверты
    /// (1 = secretbox + XOR, 2 = secretbox + HKDF)
    pub default_envelope_format: u8,

    // ============================================
    // ЛОКАЛЬНОЕ ХРАНИЛИЩЕ КЛЮЧЕЙ
    // ============================================
    /// PBKDF2: количество итераций для деривации мастер-ключа из пароля.
    /// Действует при инициализации хранилища, дальше берётся сохранённое.
    pub pbkdf2_iterations: u32,

    // ============================================
    // КЕШИ И ЗАГРУЗКА ИСТОРИИ
    // ============================================
    /// Сколько только что отправленных plaintext держать на беседу
    pub sent_cache_capacity: usize,

    /// Размер страницы при загрузке истории беседы
    pub conversation_page_size: usize,
}

impl Config {
    /// Создать конфигурацию с дефолтными значениями
    pub fn default() -> Self {
        Self {
            classical_key_size: 32,
            pq_public_key_size: 1184,
            shared_secret_size: 32,

            default_envelope_format: 1,

            pbkdf2_iterations: 100_000,

            sent_cache_capacity: 256,
            conversation_page_size: 50,
        }
    }

    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Переопределяем значения из env, если они заданы
        if let Ok(val) = std::env::var("PBKDF2_ITERATIONS") {
            if let Ok(parsed) = val.parse() {
                config.pbkdf2_iterations = parsed;
            }
        }

        if let Ok(val) = std::env::var("HYBRID_ENVELOPE_FORMAT") {
            if let Ok(parsed) = val.parse() {
                config.default_envelope_format = parsed;
            }
        }

        if let Ok(val) = std::env::var("SENT_CACHE_CAPACITY") {
            if let Ok(parsed) = val.parse() {
                config.sent_cache_capacity = parsed;
            }
        }

        if let Ok(val) = std::env::var("CONVERSATION_PAGE_SIZE") {
            if let Ok(parsed) = val.parse() {
                config.conversation_page_size = parsed;
            }
        }

        config
    }

    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализирует конфигурацию со значениями по умолчанию при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Инициализировать глобальную конфигурацию со значениями по умолчанию
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::default())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию из переменных окружения
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_from_env() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::from_env())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| "Config already initialized")
    }

    /// Проверить, инициализирована ли глобальная конфигурация
    pub fn is_initialized() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }
}
