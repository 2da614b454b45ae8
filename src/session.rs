use tower_sessions::Session;

/// Resolves the caller's user id from the session layer. Login itself is
/// owned by the API gateway; this core only reads what it set.
pub async fn current_user_id(session: &Session) -> Option<i32> {
    match session.get::<i32>("user_id").await {
        Ok(Some(user_id)) => Some(user_id),
        Ok(None) => None,
        Err(e) => {
            log::error!("Failed to read user_id from session: {}", e);
            None
        }
    }
}
