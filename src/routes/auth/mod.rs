mod handler;
mod model;

pub use handler::{
    confirm_email,
    login,
    oauth_callback,
    sign_in_with_github,
    sign_in_with_google,
    signout,
    signup,
};
