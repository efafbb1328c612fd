mod error;
mod handlers;
mod models;
mod ocr;
mod state;
mod util;

pub use error::ServerError;
pub use handlers::{router, run_server};
pub use models::{ErrorResponse, OcrResponse};
pub use state::ServerState;
