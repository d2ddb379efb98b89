use colored::Colorize;
use verdant::prelude::*;

use super::CommandResult;

/// Resolve the role of `email`, authenticating with `token` or the
/// configured `api.token`.
pub async fn run(market: &Marketplace, email: &str, token: Option<String>) -> CommandResult {
    let token = token.or_else(|| market.config().api_token.clone());
    market.identity().sign_in(Principal::new(email, email), token);

    let mut query = market.role();
    if !query.is_enabled() {
        return Err(ClientError::invalid("email", "Email is required").into());
    }
    let role = query.settled().await;
    if let Some(err) = query.error() {
        return Err(err.into());
    }

    match role {
        Some(role) => println!("{} {}", email.bold(), role_label(&role)),
        None => println!("{} {}", email.bold(), "no role".dimmed()),
    }
    Ok(())
}

pub fn role_label(role: &Role) -> String {
    match role {
        Role::Admin => role.as_str().red().bold().to_string(),
        Role::Seller => role.as_str().green().to_string(),
        Role::Customer => role.as_str().cyan().to_string(),
        Role::Other(tag) => tag.yellow().to_string(),
    }
}
