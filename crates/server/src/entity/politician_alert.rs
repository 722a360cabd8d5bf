//! Legacy per-politician alerts: "mail this address whenever this politician
//! speaks". Unlike [`crate::entity::subscription`] there is no confirmation
//! step and no active flag.

use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "politician_alert")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub politician_id: i32,
    pub email: String,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::politician::Entity",
        from = "Column::PoliticianId",
        to = "super::politician::Column::Id"
    )]
    Politician,
}

impl Related<super::politician::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Politician.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
