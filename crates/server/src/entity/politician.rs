use sea_orm::entity::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, ToSchema)]
#[schema(as = Politician)]
#[sea_orm(table_name = "politician")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// URL slug, also used in saved search queries (`MP: "<identifier>"`).
    pub identifier: String,
    pub current_member: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::politician_alert::Entity")]
    PoliticianAlert,
}

impl Related<super::politician_alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PoliticianAlert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
