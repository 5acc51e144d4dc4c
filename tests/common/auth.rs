use progression_backend::auth::sign_jwt_for_user;

use super::app::TestApp;

/// Issues a user token the way the external auth service would.
pub fn token_for(app: &TestApp, user_id: &str, display_name: Option<&str>) -> String {
    sign_jwt_for_user(user_id, display_name, &app.config.jwt_secret, 1).expect("sign test token")
}

pub fn new_user(app: &TestApp) -> (String, String) {
    let user_id = format!("user-{}", uuid::Uuid::new_v4().simple());
    let token = token_for(app, &user_id, None);
    (user_id, token)
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}
