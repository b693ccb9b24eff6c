use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    error::StoreError,
    orders::{
        luhn,
        repo::OrderRepo,
        repo_types::{Order, OrderStatus},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Nothing left after trimming whitespace.
    Empty,
    NotDigits,
    Checksum,
}

/// Result of admitting an order number. Store faults travel separately as
/// `Err(StoreError)`.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// First submission; the order was created in `NEW`.
    Accepted(Order),
    /// Same user submitted the same number before. Not an error.
    AlreadyAccepted(Order),
    /// The number belongs to another user.
    OwnedByOther,
    Rejected(RejectReason),
}

pub struct OrderService {
    orders: Arc<dyn OrderRepo>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepo>) -> Self {
        Self { orders }
    }

    pub async fn submit(&self, user_id: i64, raw_number: &str) -> Result<SubmitOutcome, StoreError> {
        let number = raw_number.trim();
        if number.is_empty() {
            return Ok(SubmitOutcome::Rejected(RejectReason::Empty));
        }
        if !luhn::is_digits(number) {
            warn!(user_id, "order number is not all digits");
            return Ok(SubmitOutcome::Rejected(RejectReason::NotDigits));
        }
        if !luhn::is_valid(number) {
            warn!(user_id, %number, "order number failed checksum");
            return Ok(SubmitOutcome::Rejected(RejectReason::Checksum));
        }

        // Insert first and let the unique index arbitrate; checking for the
        // number beforehand would leave a race window.
        match self.orders.create_order(user_id, number).await {
            Ok(order) => {
                info!(user_id, %number, order_id = order.id, "order accepted");
                Ok(SubmitOutcome::Accepted(order))
            }
            Err(StoreError::Conflict) => {
                let existing = self.orders.get_by_number(number).await.map_err(|e| {
                    error!(error = %e, %number, "re-read of conflicting order failed");
                    e
                })?;
                if existing.user_id == user_id {
                    info!(user_id, %number, "order already accepted for this user");
                    Ok(SubmitOutcome::AlreadyAccepted(existing))
                } else {
                    warn!(user_id, owner_id = existing.user_id, %number, "order owned by another user");
                    Ok(SubmitOutcome::OwnedByOther)
                }
            }
            Err(e) => {
                error!(error = %e, user_id, %number, "create order failed");
                Err(e)
            }
        }
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        self.orders.list_by_user(user_id).await.map_err(|e| {
            error!(error = %e, user_id, "list orders failed");
            e
        })
    }

    /// Write path for the accrual reconciliation process.
    pub async fn update_status(&self, order_id: i64, status: OrderStatus) -> Result<(), StoreError> {
        self.orders.update_status(order_id, status).await.map_err(|e| {
            warn!(error = %e, order_id, %status, "status update rejected");
            e
        })?;
        info!(order_id, %status, "order status updated");
        Ok(())
    }

    pub async fn update_accrual(
        &self,
        order_id: i64,
        accrual: f64,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        self.orders
            .update_accrual(order_id, accrual, status)
            .await
            .map_err(|e| {
                warn!(error = %e, order_id, accrual, %status, "accrual update rejected");
                e
            })?;
        info!(order_id, accrual, %status, "order accrual updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryOrderRepo;

    fn service() -> (OrderService, Arc<MemoryOrderRepo>) {
        let repo = Arc::new(MemoryOrderRepo::default());
        (OrderService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn accepted_then_already_accepted_then_owned_by_other() {
        let (svc, repo) = service();

        let first = svc.submit(1, "79927398713").await.unwrap();
        let order = match first {
            SubmitOutcome::Accepted(o) => o,
            other => panic!("expected Accepted, got {other:?}"),
        };
        assert_eq!(order.user_id, 1);
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.accrual, None);

        match svc.submit(1, "79927398713").await.unwrap() {
            SubmitOutcome::AlreadyAccepted(o) => assert_eq!(o.id, order.id),
            other => panic!("expected AlreadyAccepted, got {other:?}"),
        }
        assert_eq!(svc.submit(2, "79927398713").await.unwrap(), SubmitOutcome::OwnedByOther);

        assert_eq!(repo.len(), 1);
        let stored = repo.get_by_number("79927398713").await.unwrap();
        assert_eq!(stored.user_id, 1);
    }

    #[tokio::test]
    async fn resubmission_never_creates_second_row() {
        let (svc, repo) = service();
        svc.submit(5, "12345678903").await.unwrap();
        for _ in 0..5 {
            assert!(matches!(
                svc.submit(5, " 12345678903\n").await.unwrap(),
                SubmitOutcome::AlreadyAccepted(_)
            ));
        }
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn rejects_malformed_and_bad_checksum_without_store_access() {
        let (svc, repo) = service();
        let cases = [
            ("", RejectReason::Empty),
            ("   \n\t", RejectReason::Empty),
            ("12a45", RejectReason::NotDigits),
            ("7992 7398713", RejectReason::NotDigits),
            ("123456", RejectReason::Checksum),
            ("79927398710", RejectReason::Checksum),
        ];
        for user_id in [1, 2] {
            for (raw, reason) in cases {
                assert_eq!(
                    svc.submit(user_id, raw).await.unwrap(),
                    SubmitOutcome::Rejected(reason),
                    "{raw:?}"
                );
            }
        }
        assert_eq!(repo.len(), 0);
    }

    #[tokio::test]
    async fn trims_surrounding_whitespace_before_storing() {
        let (svc, _repo) = service();
        match svc.submit(1, "  4561261212345467 \r\n").await.unwrap() {
            SubmitOutcome::Accepted(o) => assert_eq!(o.number, "4561261212345467"),
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn long_numbers_are_accepted() {
        let (svc, repo) = service();
        // each "18" pair contributes 1*2 + 8 = 10 to the checksum
        let number = "18".repeat(150);
        assert!(luhn::is_valid(&number));
        match svc.submit(1, &number).await.unwrap() {
            SubmitOutcome::Accepted(o) => assert_eq!(o.number.len(), 300),
            other => panic!("expected Accepted, got {other:?}"),
        }
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_submissions_insert_exactly_once() {
        let (svc, repo) = service();
        let svc = Arc::new(svc);
        let mut handles = Vec::new();
        for i in 0..16 {
            let svc = svc.clone();
            // even tasks act as user 1, odd ones as user 2
            let user_id = 1 + (i % 2);
            handles.push(tokio::spawn(async move {
                (user_id, svc.submit(user_id, "9278923470").await.unwrap())
            }));
        }

        let mut results = Vec::new();
        for h in handles {
            results.push(h.await.unwrap());
        }
        let winners: Vec<_> = results
            .iter()
            .filter(|(_, r)| matches!(r, SubmitOutcome::Accepted(_)))
            .collect();
        assert_eq!(winners.len(), 1);
        let owner = winners[0].0;
        for (user_id, outcome) in &results {
            match outcome {
                SubmitOutcome::Accepted(_) => {}
                SubmitOutcome::AlreadyAccepted(_) => assert_eq!(*user_id, owner),
                SubmitOutcome::OwnedByOther => assert_ne!(*user_id, owner),
                SubmitOutcome::Rejected(r) => panic!("unexpected rejection {r:?}"),
            }
        }
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_scoped_to_user() {
        let (svc, _repo) = service();
        assert!(svc.list_for_user(1).await.unwrap().is_empty());

        for n in ["79927398713", "12345678903", "4561261212345467"] {
            svc.submit(1, n).await.unwrap();
        }
        svc.submit(2, "2377225624").await.unwrap();

        let mine = svc.list_for_user(1).await.unwrap();
        let numbers: Vec<_> = mine.iter().map(|o| o.number.as_str()).collect();
        assert_eq!(numbers, ["4561261212345467", "12345678903", "79927398713"]);
        assert!(mine.iter().all(|o| o.user_id == 1));
        assert!(mine.windows(2).all(|w| w[0].uploaded_at >= w[1].uploaded_at));

        let theirs = svc.list_for_user(2).await.unwrap();
        assert_eq!(theirs.len(), 1);
        assert!(svc.list_for_user(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_updates_follow_the_state_machine() {
        let (svc, repo) = service();
        let order = match svc.submit(1, "79927398713").await.unwrap() {
            SubmitOutcome::Accepted(o) => o,
            other => panic!("expected Accepted, got {other:?}"),
        };

        svc.update_status(order.id, OrderStatus::Processing).await.unwrap();
        svc.update_status(order.id, OrderStatus::Processing).await.unwrap();
        svc.update_accrual(order.id, 500.5, OrderStatus::Processed)
            .await
            .unwrap();

        let stored = repo.get_by_id(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Processed);
        assert_eq!(stored.accrual, Some(500.5));

        assert!(matches!(
            svc.update_status(order.id, OrderStatus::New).await.unwrap_err(),
            StoreError::IllegalTransition { .. }
        ));
        assert!(matches!(
            svc.update_accrual(order.id, 0.0, OrderStatus::Invalid)
                .await
                .unwrap_err(),
            StoreError::IllegalTransition { .. }
        ));
        assert_eq!(repo.get_by_id(order.id).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn updates_to_missing_orders_are_not_found() {
        let (svc, _repo) = service();
        assert!(matches!(
            svc.update_status(404, OrderStatus::Processing).await.unwrap_err(),
            StoreError::NotFound
        ));
        assert!(matches!(
            svc.update_accrual(404, 10.0, OrderStatus::Processed)
                .await
                .unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn negative_accrual_is_rejected() {
        let (svc, repo) = service();
        svc.submit(1, "18").await.unwrap();
        let order = repo.get_by_number("18").await.unwrap();
        assert!(matches!(
            svc.update_accrual(order.id, -1.0, OrderStatus::Processed)
                .await
                .unwrap_err(),
            StoreError::InvalidAccrual(_)
        ));
        assert_eq!(repo.get_by_id(order.id).await.unwrap().status, OrderStatus::New);
    }

    #[tokio::test]
    async fn accrual_is_only_set_with_processed() {
        let (svc, repo) = service();
        svc.submit(1, "0").await.unwrap();
        let order = repo.get_by_number("0").await.unwrap();

        for status in [OrderStatus::New, OrderStatus::Processing] {
            assert!(matches!(
                svc.update_accrual(order.id, 5.0, status).await.unwrap_err(),
                StoreError::InvalidAccrual(_)
            ));
        }
        assert_eq!(repo.get_by_id(order.id).await.unwrap(), order);

        svc.update_accrual(order.id, 0.0, OrderStatus::Processing)
            .await
            .unwrap();
        let stored = repo.get_by_id(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);

        svc.update_accrual(order.id, 5.0, OrderStatus::Processed)
            .await
            .unwrap();
        assert_eq!(repo.get_by_id(order.id).await.unwrap().accrual, Some(5.0));
    }

    #[tokio::test]
    async fn store_faults_surface_as_errors() {
        let repo = Arc::new(MemoryOrderRepo::default());
        repo.fail_with_timeouts(true);
        let svc = OrderService::new(repo.clone());
        assert!(matches!(
            svc.submit(1, "79927398713").await.unwrap_err(),
            StoreError::Timeout(_)
        ));
        assert!(svc.list_for_user(1).await.is_err());
    }
}
