//! Users command - the directory rules assign and notify.

use anyhow::Result;
use casework_types::User;
use clap::{Args, Subcommand};

use super::{Context, dim, heading, success};

/// Arguments for the users command.
#[derive(Args, Debug)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    /// Add a user, or rename an existing one
    Add {
        /// User ID
        id: String,

        /// Display name
        name: String,
    },

    /// List users
    List,
}

/// Run the users command.
pub fn run(args: UsersArgs, ctx: &Context) -> Result<()> {
    let services = ctx.services()?;

    match args.command {
        UsersCommand::Add { id, name } => {
            let user = User::new(id, name);
            services.store().upsert_user(&user)?;
            if !ctx.emit_json(&user)? {
                success(format!("Saved user {} ({})", user.id, user.display_name));
            }
        }
        UsersCommand::List => {
            let users = services.store().list_users()?;
            if ctx.emit_json(&users)? {
                return Ok(());
            }
            heading("Users");
            if users.is_empty() {
                println!("{}", dim("No users"));
            }
            for user in &users {
                println!("  {:<20} {}", user.id, user.display_name);
            }
        }
    }

    Ok(())
}
