pub mod sale;
pub mod session;

pub use sale::{SaleRepository, SqliteSaleRepository};
pub use session::{SessionRepository, SqliteSessionRepository};
