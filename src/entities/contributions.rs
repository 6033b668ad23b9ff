use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// The only contribution status treated as settled money.
pub const STATUS_COMPLETED: &str = "completed";

#[derive(Clone, Debug, PartialEq, Default, DeriveEntityModel)]
#[sea_orm(table_name = "contributions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub gift_id: Uuid,
    /// Gross amount paid by the guest
    pub amount: f64,
    /// Portion retained by the platform / referrer
    pub commission: f64,
    pub status: String,
    pub is_asoebi: bool,
    /// Legacy flat quantity, superseded by the breakdown columns when they are set
    pub asoebi_quantity: Option<i32>,
    pub asoebi_qty_men: Option<i32>,
    pub asoebi_qty_women: Option<i32>,
    pub asoebi_bride_men_qty: Option<i32>,
    pub asoebi_bride_women_qty: Option<i32>,
    pub asoebi_groom_men_qty: Option<i32>,
    pub asoebi_groom_women_qty: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    /// Breakdown counts in column order, absent values read as 0.
    pub fn breakdown(&self) -> [i32; 6] {
        [
            self.asoebi_qty_men,
            self.asoebi_qty_women,
            self.asoebi_bride_men_qty,
            self.asoebi_bride_women_qty,
            self.asoebi_groom_men_qty,
            self.asoebi_groom_women_qty,
        ]
        .map(|v| v.unwrap_or(0))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::gifts::Entity",
        from = "Column::GiftId",
        to = "super::gifts::Column::Id"
    )]
    Gift,
}

impl Related<super::gifts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gift.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
