use crate::devops::TeamFieldValues;
use color_eyre::eyre::{eyre, Report};

/// States whose items are finished and never re-ranked.
pub const EXCLUDED_STATES: [&str; 3] = ["Closed", "Done", "Removed"];

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Restricts a query to the area paths a team owns.
pub fn area_clause(team_fields: &TeamFieldValues) -> Result<String, Report> {
    if team_fields.values.is_empty() {
        return Err(eyre!("team owns no area paths"));
    }
    let areas = team_fields
        .values
        .iter()
        .map(|area| {
            let operator = if area.include_children { "UNDER" } else { "=" };
            format!("[System.AreaPath] {} {}", operator, quote(&area.value))
        })
        .collect::<Vec<_>>()
        .join(" OR ");
    Ok(format!("AND ( {} )", areas))
}

/// Selects the open items of one work item type inside the team's areas.
pub fn candidate_query(level: &str, area_clause: &str) -> String {
    let states = EXCLUDED_STATES
        .iter()
        .map(|state| format!("[System.State] <> {}", quote(state)))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "SELECT [System.Id] FROM WorkItems WHERE {} AND [System.WorkItemType] = {} {}",
        states,
        quote(level),
        area_clause
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devops::TeamFieldValue;

    fn area(value: &str, include_children: bool) -> TeamFieldValue {
        TeamFieldValue {
            value: value.to_owned(),
            include_children,
        }
    }

    #[test]
    fn areas_are_joined_with_or() {
        let fields = TeamFieldValues {
            values: vec![area("Fabrikam\\Web", true), area("Fabrikam\\Mobile", false)],
        };
        assert_eq!(
            area_clause(&fields).unwrap(),
            "AND ( [System.AreaPath] UNDER 'Fabrikam\\Web' OR [System.AreaPath] = 'Fabrikam\\Mobile' )"
        );
    }

    #[test]
    fn team_without_areas_is_an_error() {
        assert!(area_clause(&TeamFieldValues::default()).is_err());
    }

    #[test]
    fn query_excludes_finished_states_and_escapes_quotes() {
        let query = candidate_query("User's Story", "AND ( [System.AreaPath] = 'A' )");
        assert_eq!(
            query,
            "SELECT [System.Id] FROM WorkItems WHERE [System.State] <> 'Closed' \
             AND [System.State] <> 'Done' AND [System.State] <> 'Removed' \
             AND [System.WorkItemType] = 'User''s Story' AND ( [System.AreaPath] = 'A' )"
        );
    }
}
