//! Implementation of `anifeed user` subcommands.

use anyhow::Result;

use anifeed_core::store::users::{NewUser, ProfileChange};

use crate::cli::commands::helpers::Session;
use crate::cli::UserCommands;
use crate::output::{Formatter, OutputFormat};

pub fn run_user(session: &Session, cmd: UserCommands, format: OutputFormat) -> Result<()> {
    let users = session.services.users();
    let formatter = Formatter::new(format);

    match cmd {
        UserCommands::Create {
            username,
            email,
            password_hash,
            display_name,
            avatar_url,
            language,
        } => {
            let user = users.create(NewUser {
                username,
                email,
                password_hash,
                display_name,
                avatar_url,
                preferred_language: language,
            })?;
            formatter.print(&user)?;
        }
        UserCommands::Update {
            username,
            display_name,
            avatar_url,
            language,
        } => {
            let user = users.update_profile(
                session.actor()?,
                ProfileChange {
                    username,
                    display_name,
                    avatar_url,
                    preferred_language: language,
                },
            )?;
            formatter.print(&user)?;
        }
        UserCommands::Show { user_id } => formatter.print(&users.get(user_id)?)?,
        UserCommands::Find { username } => formatter.print(&users.find_by_username(&username)?)?,
        UserCommands::Follow { user_id } => {
            let follower = session.actor()?;
            users.follow(follower, user_id)?;
            formatter.print(&serde_json::json!({
                "follower_id": follower,
                "following_id": user_id,
                "following": true,
            }))?;
        }
        UserCommands::Unfollow { user_id } => {
            let follower = session.actor()?;
            users.unfollow(follower, user_id)?;
            formatter.print(&serde_json::json!({
                "follower_id": follower,
                "following_id": user_id,
                "following": false,
            }))?;
        }
        UserCommands::Followers { user_id } => {
            formatter.print_list(&users.followers(user_id)?, "No followers", "followers")?;
        }
        UserCommands::Following { user_id } => {
            formatter.print_list(&users.followees(user_id)?, "Not following anyone", "following")?;
        }
    }

    Ok(())
}
