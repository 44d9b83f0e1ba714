use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Booking, Role};
use crate::{CoreError, CoreResult};

/// Actions a caller may be allowed to perform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BookSeat,
    ManageOwnBookings,
    ManageAnyBooking,
    ManageFlights,
    ViewSales,
}

impl Role {
    pub fn grants(&self, capability: Capability) -> bool {
        match self {
            Role::Admin => true,
            Role::Customer => matches!(
                capability,
                Capability::BookSeat | Capability::ManageOwnBookings
            ),
        }
    }
}

/// The authenticated caller as seen by the domain layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.grants(capability)
    }

    pub fn require(&self, capability: Capability) -> CoreResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!("{} may not {:?}", self.role, capability)))
        }
    }

    /// Owners manage their own bookings; anyone else needs `ManageAnyBooking`.
    pub fn can_access_booking(&self, booking: &Booking) -> bool {
        if booking.user_id == self.user_id {
            return self.can(Capability::ManageOwnBookings);
        }
        self.can(Capability::ManageAnyBooking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_capabilities() {
        let customer = Principal::new(Uuid::new_v4(), Role::Customer);
        assert!(customer.require(Capability::BookSeat).is_ok());
        assert!(customer.require(Capability::ManageOwnBookings).is_ok());
        assert!(matches!(customer.require(Capability::ManageFlights), Err(CoreError::Forbidden(_))));
        assert!(matches!(customer.require(Capability::ViewSales), Err(CoreError::Forbidden(_))));
    }

    #[test]
    fn test_admin_holds_everything() {
        let admin = Principal::new(Uuid::new_v4(), Role::Admin);
        for cap in [
            Capability::BookSeat,
            Capability::ManageOwnBookings,
            Capability::ManageAnyBooking,
            Capability::ManageFlights,
            Capability::ViewSales,
        ] {
            assert!(admin.can(cap));
        }
    }
}
