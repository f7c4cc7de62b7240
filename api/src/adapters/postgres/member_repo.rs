//! PostgreSQL adapter for MemberRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{extension::postgres::PgExpr, Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{contains_pattern, parse_or, utc};
use crate::domain::entities::{
    Member, MemberChanges, MemberId, MemberQuery, MembershipLevel, NewMember, UserId,
};
use crate::domain::ports::MemberRepository;
use crate::entity::{members, users};
use crate::error::DomainError;

/// PostgreSQL implementation of MemberRepository
pub struct PostgresMemberRepository {
    db: DatabaseConnection,
}

impl PostgresMemberRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MemberRepository for PostgresMemberRepository {
    async fn find_by_id(&self, id: &MemberId) -> Result<Option<Member>, DomainError> {
        let result = members::Entity::find_by_id(id.0).one(&self.db).await?;
        Ok(result.map(|m| m.into()))
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Member>, DomainError> {
        let result = members::Entity::find()
            .filter(members::Column::UserId.eq(user_id.0))
            .one(&self.db)
            .await?;
        Ok(result.map(|m| m.into()))
    }

    async fn create(&self, member: &NewMember) -> Result<Member, DomainError> {
        let model = members::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(member.user_id.0),
            name: Set(member.name.clone()),
            phone: Set(member.phone.clone()),
            birthday: Set(member.birthday),
            level: Set(MembershipLevel::Standard.to_string()),
            points: Set(0),
            total_spent: Set(0),
            notes: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let result = model.insert(&self.db).await?;
        Ok(result.into())
    }

    async fn update(
        &self,
        id: &MemberId,
        changes: &MemberChanges,
    ) -> Result<Member, DomainError> {
        let mut model = members::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Member {} not found", id)))?
            .into_active_model();

        if let Some(name) = &changes.name {
            model.name = Set(name.clone());
        }
        if let Some(phone) = &changes.phone {
            model.phone = Set(phone.clone());
        }
        if let Some(birthday) = changes.birthday {
            model.birthday = Set(birthday);
        }
        if let Some(notes) = &changes.notes {
            model.notes = Set(notes.clone());
        }

        let result = model.update(&self.db).await?;
        Ok(result.into())
    }

    async fn search(&self, query: &MemberQuery) -> Result<Vec<Member>, DomainError> {
        let mut select = members::Entity::find().order_by_desc(members::Column::CreatedAt);

        if let Some(term) = query.search.as_deref().filter(|t| !t.trim().is_empty()) {
            let pattern = contains_pattern(term.trim());
            select = select.filter(
                Condition::any()
                    .add(Expr::col(members::Column::Name).ilike(pattern.clone()))
                    .add(Expr::col(members::Column::Phone).ilike(pattern.clone()))
                    .add(
                        members::Column::UserId.in_subquery(
                            Query::select()
                                .column(users::Column::Id)
                                .from(users::Entity)
                                .and_where(Expr::col(users::Column::Email).ilike(pattern))
                                .to_owned(),
                        ),
                    ),
            );
        }

        let results = select
            .limit(query.limit)
            .offset(query.offset)
            .all(&self.db)
            .await?;

        Ok(results.into_iter().map(|m| m.into()).collect())
    }

    async fn add_loyalty(
        &self,
        id: &MemberId,
        points: i64,
        spent: i64,
    ) -> Result<Member, DomainError> {
        let txn = self.db.begin().await?;

        let updated = members::Entity::update_many()
            .col_expr(
                members::Column::Points,
                Expr::col(members::Column::Points).add(points),
            )
            .col_expr(
                members::Column::TotalSpent,
                Expr::col(members::Column::TotalSpent).add(spent),
            )
            .filter(members::Column::Id.eq(id.0))
            .filter(Expr::expr(Expr::col(members::Column::Points).add(points)).gte(0))
            .exec(&txn)
            .await?;

        let model = members::Entity::find_by_id(id.0)
            .one(&txn)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Member {} not found", id)))?;
        if updated.rows_affected == 0 {
            return Err(DomainError::Validation(format!(
                "Member has only {} points",
                model.points
            )));
        }

        let level = MembershipLevel::from_total_spent(model.total_spent);
        let mut member: Member = model.into();
        if member.level != level {
            members::Entity::update_many()
                .col_expr(members::Column::Level, Expr::value(level.to_string()))
                .filter(members::Column::Id.eq(id.0))
                .exec(&txn)
                .await?;
            member.level = level;
        }

        txn.commit().await?;
        Ok(member)
    }

    async fn count_created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let count = members::Entity::find()
            .filter(members::Column::CreatedAt.gte(from.fixed_offset()))
            .filter(members::Column::CreatedAt.lt(to.fixed_offset()))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}

impl From<members::Model> for Member {
    fn from(model: members::Model) -> Self {
        Member {
            id: MemberId(model.id),
            user_id: UserId(model.user_id),
            name: model.name,
            phone: model.phone,
            birthday: model.birthday,
            level: parse_or(&model.level, MembershipLevel::Standard),
            points: model.points,
            total_spent: model.total_spent,
            notes: model.notes,
            created_at: utc(model.created_at),
        }
    }
}
