use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    db::with_deadline,
    error::StoreError,
    orders::repo_types::{Order, OrderStatus},
};

/// Order store. `number` is unique system-wide; the store, not the caller,
/// decides which of two racing inserts wins.
#[async_trait]
pub trait OrderRepo: Send + Sync {
    /// Inserts a NEW order. `Conflict` if the number exists for any user.
    async fn create_order(&self, user_id: i64, number: &str) -> Result<Order, StoreError>;
    async fn get_by_number(&self, number: &str) -> Result<Order, StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<Order, StoreError>;
    /// Newest first; equal timestamps keep the store's insertion order.
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError>;
    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<(), StoreError>;
    async fn update_accrual(
        &self,
        id: i64,
        accrual: f64,
        status: OrderStatus,
    ) -> Result<(), StoreError>;
}

/// Finite and non-negative; only a PROCESSED order earns a positive amount.
pub(crate) fn check_accrual(accrual: f64, status: OrderStatus) -> Result<(), StoreError> {
    let earned = accrual == 0.0 || status == OrderStatus::Processed;
    if accrual.is_finite() && accrual >= 0.0 && earned {
        Ok(())
    } else {
        Err(StoreError::InvalidAccrual(accrual))
    }
}

pub(crate) fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), StoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition { from, to })
    }
}

#[derive(Clone)]
pub struct PgOrderRepo {
    db: PgPool,
    timeout: Duration,
}

impl PgOrderRepo {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Locks the row, checks the edge, writes. A rejected edge rolls back.
    async fn transition(
        &self,
        id: i64,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<(), StoreError> {
        with_deadline(self.timeout, async {
            let mut tx = self.db.begin().await?;

            let current = sqlx::query_scalar::<_, OrderStatus>(
                r#"SELECT status FROM orders WHERE id = $1 FOR UPDATE"#,
            )
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            check_transition(current, status)?;

            match accrual {
                Some(accrual) => {
                    sqlx::query(r#"UPDATE orders SET status = $1, accrual = $2 WHERE id = $3"#)
                        .bind(status)
                        .bind(accrual)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    sqlx::query(r#"UPDATE orders SET status = $1 WHERE id = $2"#)
                        .bind(status)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
            }

            tx.commit().await?;
            Ok::<_, StoreError>(())
        })
        .await
    }
}

#[async_trait]
impl OrderRepo for PgOrderRepo {
    async fn create_order(&self, user_id: i64, number: &str) -> Result<Order, StoreError> {
        with_deadline(
            self.timeout,
            sqlx::query_as::<_, Order>(
                r#"
                INSERT INTO orders (user_id, number)
                VALUES ($1, $2)
                RETURNING id, user_id, number, status, accrual, uploaded_at
                "#,
            )
            .bind(user_id)
            .bind(number)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn get_by_number(&self, number: &str) -> Result<Order, StoreError> {
        with_deadline(
            self.timeout,
            sqlx::query_as::<_, Order>(
                r#"
                SELECT id, user_id, number, status, accrual, uploaded_at
                FROM orders
                WHERE number = $1
                "#,
            )
            .bind(number)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn get_by_id(&self, id: i64) -> Result<Order, StoreError> {
        with_deadline(
            self.timeout,
            sqlx::query_as::<_, Order>(
                r#"
                SELECT id, user_id, number, status, accrual, uploaded_at
                FROM orders
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        with_deadline(
            self.timeout,
            sqlx::query_as::<_, Order>(
                r#"
                SELECT id, user_id, number, status, accrual, uploaded_at
                FROM orders
                WHERE user_id = $1
                ORDER BY uploaded_at DESC, id DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.db),
        )
        .await
    }

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<(), StoreError> {
        self.transition(id, status, None).await
    }

    async fn update_accrual(
        &self,
        id: i64,
        accrual: f64,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        check_accrual(accrual, status)?;
        self.transition(id, status, Some(accrual)).await
    }
}
