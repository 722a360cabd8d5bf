//! A single utterance within a Hansard.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "statement")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub hansard_id: i32,
    /// `None` for procedural text with no speaker.
    pub politician_id: Option<i32>,
    /// Position within the transcript; statements are always read in this order.
    pub sequence: i32,
    pub topic: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::hansard::Entity",
        from = "Column::HansardId",
        to = "super::hansard::Column::Id"
    )]
    Hansard,
}

impl Related<super::hansard::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Hansard.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
