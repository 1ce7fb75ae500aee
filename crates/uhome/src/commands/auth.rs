//! OAuth bootstrap handlers.

use uuid::Uuid;

use crate::cli::{AuthArgs, AuthCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;
use crate::session::ProfileContext;

pub async fn handle(args: AuthArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = ProfileContext::load(global)?;
    let oauth = ctx.oauth_client(global)?;

    match args.command {
        AuthCommand::Url {
            redirect_uri,
            state,
        } => {
            let redirect_uri = ctx.redirect_uri(redirect_uri)?;
            let state = state.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
            let url = oauth.authorize_url(&redirect_uri, &state);
            output::print_output(url.as_str(), global.quiet);
            if !global.quiet {
                eprintln!("Open the URL, approve access, then run: uhome auth exchange <code>");
            }
        }

        AuthCommand::Exchange { code, redirect_uri } => {
            let redirect_uri = ctx.redirect_uri(redirect_uri)?;
            let token = oauth
                .exchange_code(&code, &redirect_uri)
                .await
                .map_err(|e| CliError::from(e).with_profile(&ctx.name))?;
            uhome_config::store_token(&ctx.name, &token)?;
            if !global.quiet {
                eprintln!(
                    "Profile '{}' authorized; access token valid until {}",
                    ctx.name,
                    token.expires_at().to_rfc3339()
                );
            }
        }
    }
    Ok(())
}
