pub mod login_response;
