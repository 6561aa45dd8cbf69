use tracing::{error, info, warn};

use crate::gateway::sqlite::timestamp;
use crate::gateway::{
    insert_record, read_records, Filter, Gateway, GatewayError, GatewayResult, Table,
};
use crate::profiles::profiles_for;

use super::data::*;

/// Lowercases, turns whitespace runs into single hyphens and drops anything
/// outside `[a-z0-9-]`.
pub fn team_slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

fn teams_by_id(ids: &[String]) -> Filter {
    Filter::new()
        .or(ids.iter().map(|id| Filter::new().eq("id", id.as_str())).collect())
        .order_asc("name")
}

/// Creates the team and makes the creator its owner. If the owner
/// membership cannot be written the team is deleted again.
pub async fn create_team(gateway: &dyn Gateway, form: &TeamForm) -> Result<Team, TeamError> {
    let user_id = gateway.user_id()?.to_string();
    let name = form.name.trim();
    if name.is_empty() {
        return Err(TeamError::Validation("Team Name is required.".to_string()));
    }
    let slug = team_slug(name);
    if slug.is_empty() {
        return Err(TeamError::Validation(
            "Team Name must contain letters or numbers.".to_string(),
        ));
    }
    let description = form.description.trim();

    let new_team = NewTeam {
        name: name.to_string(),
        slug: slug.clone(),
        description: (!description.is_empty()).then(|| description.to_string()),
        icon_name: form.icon.name().to_string(),
        color_scheme: form.color_scheme.clone(),
        created_by: user_id.clone(),
    };
    let team: Team = match insert_record(gateway, Table::Teams, &new_team).await {
        Ok(team) => team,
        Err(GatewayError::Conflict(_)) => {
            return Err(TeamError::Gateway(GatewayError::Conflict(format!(
                "a team with the name or slug \"{}\" might already exist",
                slug
            ))))
        }
        Err(e) => return Err(e.into()),
    };

    let membership = NewMembership {
        team_id: team.id.clone(),
        user_id,
        role: TeamRole::Owner,
        joined_at: timestamp(),
    };
    if let Err(source) =
        insert_record::<_, Membership>(gateway, Table::UserTeamMemberships, &membership).await
    {
        warn!(team_id = %team.id, error = %source, "owner membership failed, removing team");

        return match gateway.delete(Table::Teams, &team.id).await {
            Ok(()) => Err(TeamError::MembershipRolledBack { source }),
            Err(e) => {
                error!(team_id = %team.id, error = %e, "could not remove team without owner");
                Err(TeamError::MembershipFailed {
                    team_id: team.id,
                    source,
                })
            }
        };
    }

    info!(team_id = %team.id, slug = %team.slug, "created team");
    Ok(team)
}

pub async fn memberships_for_user(gateway: &dyn Gateway) -> GatewayResult<Vec<Membership>> {
    let user_id = gateway.user_id()?;
    read_records(
        gateway,
        Table::UserTeamMemberships,
        &Filter::new().eq("user_id", user_id),
    )
    .await
}

/// Teams the session user belongs to, by name.
pub async fn teams_for_user(gateway: &dyn Gateway) -> GatewayResult<Vec<Team>> {
    let team_ids: Vec<String> = memberships_for_user(gateway)
        .await?
        .into_iter()
        .map(|m| m.team_id)
        .collect();
    if team_ids.is_empty() {
        return Ok(vec![]);
    }

    read_records(gateway, Table::Teams, &teams_by_id(&team_ids)).await
}

/// Teams the session user could still join.
pub async fn joinable_teams(gateway: &dyn Gateway) -> GatewayResult<Vec<Team>> {
    let joined: Vec<String> = memberships_for_user(gateway)
        .await?
        .into_iter()
        .map(|m| m.team_id)
        .collect();
    let teams: Vec<Team> =
        read_records(gateway, Table::Teams, &Filter::new().order_asc("name")).await?;

    Ok(teams
        .into_iter()
        .filter(|team| !joined.contains(&team.id))
        .collect())
}

pub async fn is_team_owner(gateway: &dyn Gateway, team_id: &str) -> GatewayResult<bool> {
    let user_id = gateway.user_id()?;

    let owner_membership = gateway
        .read_one(
            Table::UserTeamMemberships,
            &Filter::new()
                .eq("team_id", team_id)
                .eq("user_id", user_id)
                .eq("role", "owner"),
        )
        .await?;
    if owner_membership.is_some() {
        return Ok(true);
    }

    let created = gateway
        .read_one(
            Table::Teams,
            &Filter::new().eq("id", team_id).eq("created_by", user_id),
        )
        .await?;
    Ok(created.is_some())
}

pub async fn join_team(gateway: &dyn Gateway, team_id: &str) -> GatewayResult<Membership> {
    let membership = NewMembership {
        team_id: team_id.to_string(),
        user_id: gateway.user_id()?.to_string(),
        role: TeamRole::Member,
        joined_at: timestamp(),
    };

    match insert_record(gateway, Table::UserTeamMemberships, &membership).await {
        Ok(membership) => {
            info!(team_id, "joined team");
            Ok(membership)
        }
        Err(GatewayError::Conflict(_)) => Err(GatewayError::Conflict(
            "you are already a member of this team".to_string(),
        )),
        Err(e) => Err(e),
    }
}

/// Members of a team the session user belongs to, with their public names
/// and avatars, in joining order.
pub async fn team_members_with_profiles(
    gateway: &dyn Gateway,
    team_id: &str,
) -> GatewayResult<Vec<TeamMember>> {
    let memberships: Vec<Membership> = read_records(
        gateway,
        Table::UserTeamMemberships,
        &Filter::new().eq("team_id", team_id).order_asc("joined_at"),
    )
    .await?;
    let user_ids: Vec<&str> = memberships.iter().map(|m| m.user_id.as_str()).collect();
    let profiles = profiles_for(gateway, &user_ids).await?;

    Ok(memberships
        .iter()
        .map(|membership| {
            let profile = profiles.get(&membership.user_id);
            TeamMember {
                id: membership.user_id.clone(),
                display_name: profile
                    .map_or(crate::profiles::UNKNOWN_USER, |p| p.shown_name())
                    .to_string(),
                avatar_url: profile
                    .and_then(|p| p.avatar_url.clone())
                    .unwrap_or_default(),
                role: membership.role,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::flaky_session;
    use crate::gateway::to_row;
    use crate::profiles::Profile;

    fn form(name: &str) -> TeamForm {
        TeamForm {
            name: name.to_string(),
            icon: TeamIcon::Brain,
            ..TeamForm::default()
        }
    }

    #[test]
    fn slugs_keep_only_plain_characters() {
        assert_eq!(team_slug("  Data   Science Guild "), "data-science-guild");
        assert_eq!(team_slug("R&D 2.0"), "rd-20");
        assert_eq!(team_slug("!!!"), "");
    }

    #[tokio::test]
    async fn creator_becomes_owner() {
        let (_backend, gateway) = flaky_session("alice");

        let team = create_team(gateway.as_ref(), &form("Design Crew")).await.unwrap();

        assert_eq!(team.slug, "design-crew");
        assert_eq!(team.icon(), TeamIcon::Brain);
        assert_eq!(team.color_scheme, Some(ColorScheme::default()));
        assert!(is_team_owner(gateway.as_ref(), &team.id).await.unwrap());
        assert_eq!(teams_for_user(gateway.as_ref()).await.unwrap(), vec![team]);
    }

    #[tokio::test]
    async fn failed_owner_membership_removes_the_team() {
        let (backend, gateway) = flaky_session("alice");
        gateway.fail_inserts_into(Table::UserTeamMemberships);

        let result = create_team(gateway.as_ref(), &form("Orphans")).await;

        assert!(matches!(result, Err(TeamError::MembershipRolledBack { .. })));
        assert_eq!(
            backend.service().count(Table::Teams, &Filter::new()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn duplicate_slugs_are_reported_by_name() {
        let (_backend, gateway) = flaky_session("alice");
        create_team(gateway.as_ref(), &form("Ops")).await.unwrap();

        let duplicate = create_team(gateway.as_ref(), &form(" ops ")).await;
        match duplicate {
            Err(TeamError::Gateway(GatewayError::Conflict(message))) => {
                assert!(message.contains("\"ops\""))
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
        assert!(matches!(
            create_team(gateway.as_ref(), &form("  ")).await,
            Err(TeamError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn members_join_once_and_are_listed_with_profiles() {
        let (backend, alice) = flaky_session("alice");
        let team = create_team(alice.as_ref(), &form("Guild")).await.unwrap();
        let bob = backend.gateway(backend.issue_session("bob").unwrap());
        bob.insert(
            Table::Profiles,
            to_row(&Profile {
                id: "bob".to_string(),
                display_name: Some("Bob".to_string()),
                avatar_url: Some("https://img.example/bob.png".to_string()),
                ..Profile::default()
            })
            .unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(joinable_teams(&bob).await.unwrap().len(), 1);
        join_team(&bob, &team.id).await.unwrap();
        assert!(matches!(
            join_team(&bob, &team.id).await,
            Err(GatewayError::Conflict(_))
        ));
        assert!(joinable_teams(&bob).await.unwrap().is_empty());
        assert!(!is_team_owner(&bob, &team.id).await.unwrap());

        let members = team_members_with_profiles(&bob, &team.id).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].display_name, "Unknown User");
        assert_eq!(members[0].role, TeamRole::Owner);
        assert_eq!(members[1].display_name, "Bob");
        assert_eq!(members[1].avatar_url, "https://img.example/bob.png");
    }
}
