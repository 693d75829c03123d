pub mod api_response;
pub mod outcome;
pub mod progress;
