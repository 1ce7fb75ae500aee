//! Account-level handlers: user info and push URL registration.

use secrecy::SecretString;
use uuid::Uuid;

use uhome_api::UserInfo;

use crate::cli::{GlobalOpts, PushUrlArgs};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

fn user_detail(user: &UserInfo) -> String {
    let full_name = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    [
        format!("ID:    {}", user.id.as_deref().unwrap_or("-")),
        format!(
            "Name:  {}",
            if full_name.is_empty() { "-" } else { full_name.as_str() }
        ),
        format!("Email: {}", user.email.as_deref().unwrap_or("-")),
    ]
    .join("\n")
}

pub async fn user(global: &GlobalOpts) -> Result<(), CliError> {
    let mut session = Session::open(global, None)?;
    let result = session.coordinator.client().get_user().await;
    session.persist_rotated_token();
    let user = result.map_err(|e| session.map_err(e.into()))?;

    let out = output::render_single(global.output, &user, user_detail, |u| {
        u.id.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn push_url(args: PushUrlArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut session = Session::open(global, None)?;
    let generated = args.secret.is_none();
    let secret = args
        .secret
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

    let result = session
        .coordinator
        .register_push_url(&args.url, &SecretString::from(secret.clone()))
        .await;
    session.persist_rotated_token();
    result.map_err(|e| session.map_err(e.into()))?;

    if !global.quiet {
        eprintln!("Push URL registered: {}", args.url);
    }
    if generated {
        // The host needs this to authenticate incoming pushes.
        output::print_output(&secret, global.quiet);
    }
    Ok(())
}
