// Routes under /v3/forest-watcher. Every handler here runs behind `require_user`.
pub mod areas;
pub mod relations;
pub mod transform;

pub use areas::create as area_create;
pub use areas::delete as area_delete;
pub use areas::list as area_list;
pub use areas::list_with_teams as area_list_with_teams;
pub use areas::show as area_show;
pub use areas::update as area_update;

pub use relations::{
    add_team, add_template, area_teams, area_templates, delete_area_teams, delete_area_templates,
    delete_team_relations, delete_template_relations, remove_team, remove_template, team_areas,
};

pub use transform::start as transform;
