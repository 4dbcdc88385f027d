//! Movement record
//!
//! One row of the append-only ledger. A movement is immutable history, with
//! a single exception: a DEPOSIT may be corrected or reverted inside a
//! one-hour window after creation.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

/// How long after creation a DEPOSIT stays correctable/revertible
pub const EDIT_WINDOW: Duration = Duration::hours(1);

/// Movement type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
            Self::TransferIn => "TRANSFER_IN",
            Self::TransferOut => "TRANSFER_OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEPOSIT" => Some(Self::Deposit),
            "WITHDRAWAL" => Some(Self::Withdrawal),
            "TRANSFER_IN" => Some(Self::TransferIn),
            "TRANSFER_OUT" => Some(Self::TransferOut),
            _ => None,
        }
    }
}

/// Movement status
///
/// `Completed → Reverted` is the only transition, DEPOSIT only, one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    Completed,
    Reverted,
    Pending,
    Failed,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Reverted => "REVERTED",
            Self::Pending => "PENDING",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMPLETED" => Some(Self::Completed),
            "REVERTED" => Some(Self::Reverted),
            "PENDING" => Some(Self::Pending),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,

    /// Creation timestamp, immutable
    pub created_at: DateTime<Utc>,

    /// Positive amount moved
    pub amount: Decimal,

    pub movement_type: MovementType,

    pub description: String,

    /// Snapshot of the affected account's balance right after this movement
    pub balance_after: Decimal,

    /// Null for pure deposits
    pub origin_account_id: Option<Uuid>,

    /// Null for pure withdrawals
    pub destination_account_id: Option<Uuid>,

    pub status: MovementStatus,
}

impl Movement {
    /// The account whose balance this movement's `balance_after` snapshots.
    pub fn affected_account_id(&self) -> Option<Uuid> {
        match self.movement_type {
            MovementType::Deposit | MovementType::TransferIn => self.destination_account_id,
            MovementType::Withdrawal | MovementType::TransferOut => self.origin_account_id,
        }
    }

    /// True while `now - created_at <= EDIT_WINDOW`.
    pub fn within_edit_window(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at <= EDIT_WINDOW
    }

    /// Gate for CorrectDeposit/RevertDeposit.
    ///
    /// Type, status and window are independent checks; all must pass.
    pub fn ensure_editable(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.movement_type != MovementType::Deposit {
            return Err(DomainError::WrongMovementType {
                actual: self.movement_type.as_str().to_string(),
            });
        }
        if self.status == MovementStatus::Reverted {
            return Err(DomainError::AlreadyReverted);
        }
        if !self.within_edit_window(now) {
            return Err(DomainError::EditWindowExpired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn deposit(age: Duration, status: MovementStatus) -> Movement {
        Movement {
            id: Uuid::new_v4(),
            created_at: Utc::now() - age,
            amount: Decimal::new(100, 0),
            movement_type: MovementType::Deposit,
            description: String::new(),
            balance_after: Decimal::new(100, 0),
            origin_account_id: None,
            destination_account_id: Some(Uuid::new_v4()),
            status,
        }
    }

    #[test]
    fn test_editable_at_59_minutes() {
        let m = deposit(Duration::minutes(59), MovementStatus::Completed);
        assert!(m.ensure_editable(Utc::now()).is_ok());
    }

    #[test]
    fn test_expired_at_61_minutes() {
        let m = deposit(Duration::minutes(61), MovementStatus::Completed);
        assert!(matches!(
            m.ensure_editable(Utc::now()),
            Err(DomainError::EditWindowExpired)
        ));
    }

    #[test]
    fn test_already_reverted_rejected() {
        let m = deposit(Duration::minutes(5), MovementStatus::Reverted);
        assert!(matches!(
            m.ensure_editable(Utc::now()),
            Err(DomainError::AlreadyReverted)
        ));
    }

    #[test]
    fn test_wrong_type_rejected_before_window() {
        // Type gate fires even when the movement is old: the checks are independent
        let mut m = deposit(Duration::hours(5), MovementStatus::Completed);
        m.movement_type = MovementType::Withdrawal;
        m.origin_account_id = Some(Uuid::new_v4());
        m.destination_account_id = None;

        match m.ensure_editable(Utc::now()) {
            Err(DomainError::WrongMovementType { actual }) => assert_eq!(actual, "WITHDRAWAL"),
            other => panic!("expected WrongMovementType, got {other:?}"),
        }
    }

    #[test]
    fn test_transfer_movements_not_editable() {
        for t in [MovementType::TransferIn, MovementType::TransferOut] {
            let mut m = deposit(Duration::minutes(1), MovementStatus::Completed);
            m.movement_type = t;
            assert!(matches!(
                m.ensure_editable(Utc::now()),
                Err(DomainError::WrongMovementType { .. })
            ));
        }
    }

    #[test]
    fn test_affected_account() {
        let origin = Uuid::new_v4();
        let destination = Uuid::new_v4();

        let mut m = deposit(Duration::zero(), MovementStatus::Completed);
        m.origin_account_id = Some(origin);
        m.destination_account_id = Some(destination);

        m.movement_type = MovementType::Deposit;
        assert_eq!(m.affected_account_id(), Some(destination));
        m.movement_type = MovementType::TransferIn;
        assert_eq!(m.affected_account_id(), Some(destination));
        m.movement_type = MovementType::Withdrawal;
        assert_eq!(m.affected_account_id(), Some(origin));
        m.movement_type = MovementType::TransferOut;
        assert_eq!(m.affected_account_id(), Some(origin));
    }

    #[test]
    fn test_type_and_status_roundtrip() {
        for t in ["DEPOSIT", "WITHDRAWAL", "TRANSFER_IN", "TRANSFER_OUT"] {
            assert_eq!(MovementType::parse(t).unwrap().as_str(), t);
        }
        for s in ["COMPLETED", "REVERTED", "PENDING", "FAILED"] {
            assert_eq!(MovementStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(MovementType::parse("TRANSFER").is_none());
    }
}
