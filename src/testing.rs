//! In-memory stores with the same conflict and transition rules as the
//! Postgres ones. A single mutex per store stands in for the unique indexes.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    auth::{repo::UserRepo, repo_types::User},
    error::StoreError,
    orders::{
        repo::{check_accrual, check_transition, OrderRepo},
        repo_types::{Order, OrderStatus},
    },
};

#[derive(Default)]
pub struct MemoryUserRepo {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn soft_delete(&self, id: i64) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(u) = rows.iter_mut().find(|u| u.id == id) {
            u.deleted_at = Some(OffsetDateTime::now_utc());
        }
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.login == login) {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: rows.len() as i64 + 1,
            login: login.to_owned(),
            password_hash: password_hash.to_owned(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn get_by_login(&self, login: &str) -> Result<User, StoreError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.login == login && u.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id && u.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryOrderRepo {
    rows: Mutex<Vec<Order>>,
    timeouts: AtomicBool,
}

impl MemoryOrderRepo {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Makes every call fail as if the store deadline elapsed.
    pub fn fail_with_timeouts(&self, on: bool) {
        self.timeouts.store(on, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.timeouts.load(Ordering::SeqCst) {
            Err(StoreError::Timeout(Duration::from_secs(5)))
        } else {
            Ok(())
        }
    }

    fn transition(
        &self,
        id: i64,
        status: OrderStatus,
        accrual: Option<f64>,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut rows = self.rows.lock().unwrap();
        let order = rows
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound)?;
        check_transition(order.status, status)?;
        order.status = status;
        if accrual.is_some() {
            order.accrual = accrual;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepo for MemoryOrderRepo {
    async fn create_order(&self, user_id: i64, number: &str) -> Result<Order, StoreError> {
        self.check_available()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|o| o.number == number) {
            return Err(StoreError::Conflict);
        }
        let order = Order {
            id: rows.len() as i64 + 1,
            user_id,
            number: number.to_owned(),
            status: OrderStatus::New,
            accrual: None,
            uploaded_at: OffsetDateTime::now_utc(),
        };
        rows.push(order.clone());
        Ok(order)
    }

    async fn get_by_number(&self, number: &str) -> Result<Order, StoreError> {
        self.check_available()?;
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.number == number)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_id(&self, id: i64) -> Result<Order, StoreError> {
        self.check_available()?;
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        self.check_available()?;
        let mut orders: Vec<Order> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(orders)
    }

    async fn update_status(&self, id: i64, status: OrderStatus) -> Result<(), StoreError> {
        self.transition(id, status, None)
    }

    async fn update_accrual(
        &self,
        id: i64,
        accrual: f64,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        check_accrual(accrual, status)?;
        self.transition(id, status, Some(accrual))
    }
}
