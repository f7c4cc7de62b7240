//! Configured services inside a cart

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cart_id: Uuid,
    pub service_id: Uuid,
    #[sea_orm(column_type = "JsonBinary")]
    pub selection: Json,
    pub quantity: i32,
    pub unit_price: i64,
    pub notes: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub reference_images: Json,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
