mod handler;

pub use handler::{auth_code_error, confirm_email_notice, error_page, index, login_page, settings_page};
