// Базовые модули
pub mod consts;
pub mod error;
pub mod util;
pub mod config;

// Движок индекса: формат архива + поиск/вставка записей
pub mod archive; // src/archive/{mod,layout,codec}.rs
pub mod index;   // src/index/{mod,identity,value}.rs

// Граница с файловой системой
pub mod store;
pub mod lock;

// Импорт сохранений (сканер Checkpoint, каталог сохранений, ExtraData0)
pub mod checkpoint;
pub mod savedir;
pub mod extradata;
pub mod migrate;

pub mod cli;

// Удобные реэкспорты
pub use archive::{Archive, Record};
pub use config::MigrateConfig;
pub use error::ArchiveError;
pub use index::{
    IndexManager, Lookup, SaveAttributes, SaveDataRank, SaveDataType, SaveIdentity, SaveValue,
    UserId,
};
pub use lock::{acquire_exclusive_lock, try_acquire_exclusive_lock, LockGuard};
pub use migrate::{MigratePaths, MigrationReport, Outcome};
pub use store::{load_archive, write_archive_atomic, Origin};
