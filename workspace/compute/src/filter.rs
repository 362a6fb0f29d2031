use chrono::NaiveDate;
use model::entities::{transaction, TransactionKind};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, Select};

/// Optional constraints on a user's transaction list. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub category_id: Option<i32>,
    /// Case-insensitive substring of the description
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

impl TransactionFilter {
    pub fn between(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            ..Default::default()
        }
    }

    /// Query of the user's transactions matching this filter.
    pub fn select(&self, user_id: i32) -> Select<transaction::Entity> {
        let mut condition = Condition::all().add(transaction::Column::UserId.eq(user_id));

        if let Some(kind) = self.kind {
            condition = condition.add(transaction::Column::Kind.eq(kind));
        }
        if let Some(category_id) = self.category_id {
            condition = condition.add(transaction::Column::CategoryId.eq(category_id));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            condition = condition.add(transaction::Column::Description.contains(search));
        }
        if let Some(start_date) = self.start_date {
            condition = condition.add(transaction::Column::Date.gte(start_date));
        }
        if let Some(end_date) = self.end_date {
            condition = condition.add(transaction::Column::Date.lte(end_date));
        }
        if let Some(amount_min) = self.amount_min {
            condition = condition.add(transaction::Column::Amount.gte(amount_min));
        }
        if let Some(amount_max) = self.amount_max {
            condition = condition.add(transaction::Column::Amount.lte(amount_max));
        }

        transaction::Entity::find().filter(condition)
    }
}
