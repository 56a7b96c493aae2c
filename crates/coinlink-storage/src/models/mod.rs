pub mod sale;
pub mod session;

pub use sale::Sale;
pub use session::SessionRow;
