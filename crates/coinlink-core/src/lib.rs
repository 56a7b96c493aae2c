pub mod constants;
pub mod conversion;
pub mod error;
pub mod persistence;
pub mod process;
pub mod session;
pub mod settings;
pub mod types;

pub use conversion::{PointMap, RateTable, points_from_balance, time_from_balance};
pub use error::{Error, Result};
pub use persistence::{Persistence, SettingsStore};
pub use process::{CommandOutcome, CommandRunner, SystemRunner};
pub use session::{SessionRecord, SessionSnapshot, Settlement};
pub use settings::{Promo, RestartSchedule, Settings};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
