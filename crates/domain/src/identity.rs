//! User identity obtained from the out-of-band identity service.

use common::UserId;
use serde::{Deserialize, Serialize};

/// Contact data for the user placing an order.
///
/// Produced by the identity collaborator before order creation; the
/// orchestrator denormalizes these fields onto the order so they are
/// frozen at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// The user's identifier.
    pub id: UserId,

    /// Contact email.
    pub email: String,

    /// First name.
    pub first_name: String,

    /// Last name.
    pub last_name: String,
}
