mod handler;

pub use handler::{
    change_password,
    change_username,
    delete_account,
    update_notification_preferences,
    update_profile,
};
