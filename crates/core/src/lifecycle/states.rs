use serde::{Deserialize, Serialize};

use crate::domain::quotation::QuotationStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Update,
    Send,
    Approve,
    Reject,
    Convert,
    Remove,
    Expire,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Send => "send",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Convert => "convert",
            Self::Remove => "remove",
            Self::Expire => "expire",
        }
    }

    /// Human-readable precondition reported when the action is refused.
    pub fn requirement(&self) -> &'static str {
        match self {
            Self::Update => "only draft quotations can be edited",
            Self::Send => "only draft quotations can be sent",
            Self::Approve => "only sent quotations can be approved",
            Self::Reject => "only sent quotations can be rejected",
            Self::Convert => "only approved quotations can be converted to orders",
            Self::Remove => "converted quotations cannot be deleted",
            Self::Expire => "only draft, sent or approved quotations can expire",
        }
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status reached by a status-changing action, or `None` when the action is not
/// permitted from `current`. Update and Remove never change status.
pub fn next_status(current: QuotationStatus, action: LifecycleAction) -> Option<QuotationStatus> {
    use LifecycleAction::{Approve, Convert, Expire, Reject, Send};
    use QuotationStatus::{Approved, Converted, Draft, Expired, Rejected, Sent};

    match (current, action) {
        (Draft, Send) => Some(Sent),
        (Sent, Approve) => Some(Approved),
        (Sent, Reject) => Some(Rejected),
        (Approved, Convert) => Some(Converted),
        (Draft | Sent | Approved, Expire) => Some(Expired),
        _ => None,
    }
}

/// Whether `action` is allowed on a quotation currently in `status`.
pub fn permits(status: QuotationStatus, action: LifecycleAction) -> bool {
    match action {
        LifecycleAction::Update => status == QuotationStatus::Draft,
        LifecycleAction::Remove => status != QuotationStatus::Converted,
        _ => next_status(status, action).is_some(),
    }
}
