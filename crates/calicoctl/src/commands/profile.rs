//! Profile command handlers.

use std::fmt::Write as _;

use calico_core::{DatastoreClient, Endpoint, Profile, Rules};
use tabled::Tabled;

use crate::cli::{GlobalOpts, ProfileArgs, ProfileCommand, RuleCommand, TagCommand};
use crate::error::CliError;
use crate::output;

use super::endpoint::EndpointRow;
use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
}

// ── Detail view ─────────────────────────────────────────────────────

fn rules_detail(rules: &Rules, color: bool) -> String {
    let mut out = String::new();
    for (title, list) in [
        ("Inbound rules:", &rules.inbound_rules),
        ("Outbound rules:", &rules.outbound_rules),
    ] {
        let _ = writeln!(out, "{}", output::heading(title, color));
        for (i, rule) in list.iter().enumerate() {
            let text = rule.to_string();
            let action: &str = rule.action.as_ref();
            let rest = text.strip_prefix(action).unwrap_or_default();
            let action = output::paint_action(action, color);
            let _ = writeln!(out, "  {:>3} {action}{rest}", i + 1);
        }
    }
    out.trim_end().to_owned()
}

fn profile_detail(profile: &Profile, color: bool) -> String {
    let tags: Vec<&str> = profile.tags.iter().map(String::as_str).collect();
    format!(
        "{} {}\n{} {}\n{}",
        output::heading("Profile:", color),
        profile.name(),
        output::heading("Tags:", color),
        tags.join(", "),
        rules_detail(profile.rules(), color)
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    client: &DatastoreClient,
    args: ProfileArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    match args.command {
        ProfileCommand::Add { name } => {
            if client.profile_exists(&name).await? {
                output::status(&format!("Profile {name} already exists"), global.quiet);
            } else {
                client.create_profile(&name).await?;
                output::status(&format!("Created profile {name}"), global.quiet);
            }
            Ok(())
        }

        ProfileCommand::Remove { name, no_check } => {
            if !no_check {
                let members = client.get_profile_members_ep_ids(&name).await?;
                if !members.is_empty() {
                    return Err(CliError::ProfileInUse {
                        name,
                        count: members.len(),
                    });
                }
            }
            if !util::confirm(&format!("Delete profile '{name}'?"), global.yes)? {
                return Ok(());
            }
            client.remove_profile(&name).await?;
            output::status(&format!("Deleted profile {name}"), global.quiet);
            Ok(())
        }

        ProfileCommand::List => {
            let names: Vec<String> = client.get_profile_names().await?.into_iter().collect();
            let out = output::render_list(
                &global.output,
                &names,
                |n| ProfileRow { name: n.clone() },
                String::clone,
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ProfileCommand::Show { name } => {
            let profile = client.get_profile(&name).await?;
            let out = output::render_single(
                &global.output,
                &profile,
                |p| profile_detail(p, color),
                |p| p.name().to_owned(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ProfileCommand::Members { name } => {
            if !client.profile_exists(&name).await? {
                return Err(calico_core::CoreError::ProfileNotFound { name }.into());
            }
            let members: Vec<Endpoint> = util::flatten(&client.get_profile_members(&name).await?);
            let out = output::render_list(
                &global.output,
                &members,
                |x| EndpointRow::from(x),
                |ep| ep.endpoint_id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ProfileCommand::Tag(tag) => handle_tag(client, tag.command, global).await,

        ProfileCommand::Rule(rule) => handle_rule(client, rule.command, global, color).await,
    }
}

async fn handle_tag(
    client: &DatastoreClient,
    command: TagCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match command {
        TagCommand::Add { profile, tag } => {
            let mut p = client.get_profile(&profile).await?;
            if !p.tags.insert(tag.clone()) {
                return Err(CliError::Conflict {
                    message: format!("Profile {profile} already has tag {tag}"),
                });
            }
            client.profile_update_tags(&p).await?;
            output::status(&format!("Tag {tag} added to profile {profile}"), global.quiet);
            Ok(())
        }

        TagCommand::Remove { profile, tag } => {
            let mut p = client.get_profile(&profile).await?;
            if !p.tags.remove(&tag) {
                return Err(CliError::NotFound {
                    message: format!("Profile {profile} has no tag {tag}"),
                    list_command: format!("profile show {profile}"),
                });
            }
            client.profile_update_tags(&p).await?;
            output::status(
                &format!("Tag {tag} removed from profile {profile}"),
                global.quiet,
            );
            Ok(())
        }
    }
}

async fn handle_rule(
    client: &DatastoreClient,
    command: RuleCommand,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    match command {
        RuleCommand::Show { profile } => {
            let p = client.get_profile(&profile).await?;
            let out = output::render_single(
                &global.output,
                p.rules(),
                |r| rules_detail(r, color),
                |r| r.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RuleCommand::Json { profile } => {
            let p = client.get_profile(&profile).await?;
            let json = serde_json::to_string_pretty(&p.rules().to_json_value())
                .map_err(|e| CliError::Other(e.to_string()))?;
            output::print_output(&json, global.quiet);
            Ok(())
        }

        RuleCommand::Update { profile, from_file } => {
            let mut p = client.get_profile(&profile).await?;
            let doc = util::read_input(from_file.as_deref())?;
            let rules = Rules::from_json(&doc).map_err(|e| CliError::Validation {
                field: "rules".into(),
                reason: e.to_string(),
            })?;
            p.set_rules(rules);
            client.profile_update_rules(&p).await?;
            output::status(&format!("Updated rules of profile {profile}"), global.quiet);
            Ok(())
        }
    }
}
