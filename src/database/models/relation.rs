use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which many-to-many table a relation lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Team,
    Template,
}

impl RelationKind {
    pub const ALL: [RelationKind; 2] = [RelationKind::Team, RelationKind::Template];

    pub fn label(self) -> &'static str {
        match self {
            RelationKind::Team => "team",
            RelationKind::Template => "template",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            RelationKind::Team => "area_team_relations",
            RelationKind::Template => "area_template_relations",
        }
    }

    pub fn related_column(self) -> &'static str {
        match self {
            RelationKind::Team => "team_id",
            RelationKind::Template => "template_id",
        }
    }

    pub fn duplicate_message(self) -> String {
        format!("This {} is already assigned to this area", self.label())
    }

    pub fn missing_message(self) -> String {
        format!("This {} is not linked to this area", self.label())
    }
}

/// One area link. `related_id` is a team id or a template id depending on the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Relation {
    pub id: Uuid,
    pub area_id: String,
    pub related_id: String,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    pub fn new(area_id: impl Into<String>, related_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            area_id: area_id.into(),
            related_id: related_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Bulk delete selector; at least one side must be set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationFilter {
    pub area_id: Option<String>,
    pub related_id: Option<String>,
}

impl RelationFilter {
    pub fn area(area_id: impl Into<String>) -> Self {
        Self {
            area_id: Some(area_id.into()),
            related_id: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.area_id.is_none() && self.related_id.is_none()
    }

    pub fn matches(&self, relation: &Relation) -> bool {
        self.area_id.as_ref().map_or(true, |a| *a == relation.area_id)
            && self.related_id.as_ref().map_or(true, |r| *r == relation.related_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_relation_kind() {
        assert_eq!(
            RelationKind::Team.duplicate_message(),
            "This team is already assigned to this area"
        );
        assert_eq!(
            RelationKind::Template.missing_message(),
            "This template is not linked to this area"
        );
    }

    #[test]
    fn filter_matches_on_every_set_field() {
        let relation = Relation::new("area-1", "team-1");
        assert!(RelationFilter::area("area-1").matches(&relation));
        assert!(!RelationFilter::area("area-2").matches(&relation));

        let both = RelationFilter {
            area_id: Some("area-1".into()),
            related_id: Some("team-2".into()),
        };
        assert!(!both.matches(&relation));
        assert!(RelationFilter::default().is_empty());
    }
}
