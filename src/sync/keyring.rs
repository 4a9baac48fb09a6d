use std::collections::HashMap;

pub(crate) const SERVICE_NAME: &str = "taskboard-mail";

/// Store mail server credentials in the system keyring via Secret Service.
pub async fn store_credentials(
    server: &str,
    username: &str,
    password: &str,
) -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("server", server);

    let secret = format!("{}:{}", username, password);

    keyring
        .create_item(
            &format!("Taskboard mail ({})", server),
            &attrs,
            secret.as_bytes(),
            true, // replace existing
        )
        .await
        .map_err(|e| format!("Failed to store credentials: {}", e))?;

    Ok(())
}

/// Load mail server credentials from the system keyring.
/// Returns (username, password) if found.
pub async fn load_credentials(server: &str) -> Result<Option<(String, String)>, String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("server", server);

    let items = keyring
        .search_items(&attrs)
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    if let Some(item) = items.first() {
        let secret_bytes = item
            .secret()
            .await
            .map_err(|e| format!("Failed to read secret: {}", e))?;
        let secret = String::from_utf8(secret_bytes.to_vec())
            .map_err(|e| format!("Invalid UTF-8 in secret: {}", e))?;
        return Ok(split_secret(&secret));
    }

    Ok(None)
}

/// Secrets are stored as `username:password`; the password may itself contain ':'.
fn split_secret(secret: &str) -> Option<(String, String)> {
    secret
        .split_once(':')
        .map(|(username, password)| (username.to_string(), password.to_string()))
}
